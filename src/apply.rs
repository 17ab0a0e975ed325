//! Applies one [`Plan`] to the filesystem: partitions its new-state entries
//! into no-op, in-target-rename, postponed, and external-write groups and
//! processes them in that fixed order, then deletes old-state entries the
//! new state didn't keep.

use crate::error::Result;
use crate::fileutils::{copy_file, link_or_copy};
use crate::pathutils::is_relative_to;
use crate::plan::Plan;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    pub dry_run: bool,
    pub verbosity: Verbosity,
}

impl ApplyOptions {
    /// Whether a per-file operation line (rename/copy/link/removal) should
    /// be printed. Verbose and Debug always show these; Normal shows them
    /// only on a dry run, since a dry run's log *is* the plan the user
    /// asked to see; Quiet never shows them.
    fn shows_operations(&self) -> bool {
        match self.verbosity {
            Verbosity::Quiet => false,
            Verbosity::Normal => self.dry_run,
            Verbosity::Verbose | Verbosity::Debug => true,
        }
    }
}

/// One new-state entry, classified by how it must be applied.
enum Action {
    /// Already at its destination name; nothing to do.
    Noop { newname: PathBuf },
    /// Already under `destdir` under a different name that nothing else in
    /// this bucket currently occupies; rename directly.
    InTargetRename { newname: PathBuf, from_rel: PathBuf },
    /// Already under `destdir`, but the destination name is currently held
    /// by another old-state entry; must be staged.
    Postponed { newname: PathBuf, from_rel: PathBuf },
    /// Source lives outside `destdir`; copy or hardlink it in.
    External { newname: PathBuf, source: PathBuf },
}

pub fn apply_plan(plan: &Plan, target: &Path, opts: &ApplyOptions) -> Result<()> {
    log::trace!("applying plan for {}", plan.destdir.display());

    if !opts.dry_run {
        fs::create_dir_all(&plan.destdir)?;
    }

    let old_names: std::collections::HashSet<&PathBuf> = plan.old_state.iter().collect();
    let mut actions = Vec::with_capacity(plan.new_state.len());
    for (newname, source) in &plan.new_state {
        if is_relative_to(source, target) {
            let from_rel = source
                .strip_prefix(target)
                .expect("is_relative_to checked this")
                .to_path_buf();
            if &from_rel == newname {
                actions.push(Action::Noop {
                    newname: newname.clone(),
                });
            } else if old_names.contains(newname) {
                actions.push(Action::Postponed {
                    newname: newname.clone(),
                    from_rel,
                });
            } else {
                actions.push(Action::InTargetRename {
                    newname: newname.clone(),
                    from_rel,
                });
            }
        } else {
            actions.push(Action::External {
                newname: newname.clone(),
                source: source.clone(),
            });
        }
    }

    for action in &actions {
        if let Action::Noop { newname } = action {
            if opts.verbosity >= Verbosity::Debug {
                println!("skipped {} (nothing to do)", newname.display());
            }
        }
    }

    for action in &actions {
        if let Action::InTargetRename { newname, from_rel } = action {
            rename_in_place(&plan.destdir, from_rel, newname, opts)?;
        }
    }

    apply_postponed(&plan.destdir, &actions, opts)?;

    for action in &actions {
        if let Action::External { newname, source } = action {
            apply_external(&plan.destdir, source, newname, opts)?;
        }
    }

    for path in &plan.unselected {
        if opts.verbosity >= Verbosity::Debug {
            println!("skipped {} (unselected duplicate)", path.display());
        }
    }

    remove_superseded(plan, opts)?;

    Ok(())
}

fn rename_in_place(
    destdir: &Path,
    from_rel: &Path,
    newname: &Path,
    opts: &ApplyOptions,
) -> Result<()> {
    let from = destdir.join(from_rel);
    let to = destdir.join(newname);
    if !opts.dry_run {
        fs::rename(&from, &to)?;
    }
    if opts.shows_operations() {
        println!("renamed '{}' -> '{}'", from.display(), to.display());
    }
    Ok(())
}

/// Stages every postponed rename through a temp directory inside `destdir`
/// so that two members of the same bucket can swap names without either
/// one clobbering data still needed by the other: every source is
/// hardlinked (or copied) into the staging directory first, and only once
/// all of them have landed there are they renamed onto their final names.
fn apply_postponed(destdir: &Path, actions: &[Action], opts: &ApplyOptions) -> Result<()> {
    let postponed: Vec<(&PathBuf, &PathBuf)> = actions
        .iter()
        .filter_map(|a| match a {
            Action::Postponed { newname, from_rel } => Some((newname, from_rel)),
            _ => None,
        })
        .collect();

    if postponed.is_empty() {
        return Ok(());
    }

    if opts.dry_run {
        for (newname, from_rel) in &postponed {
            if opts.verbosity >= Verbosity::Debug {
                println!(
                    "postponed '{}' ({} already exists)",
                    destdir.join(from_rel).display(),
                    destdir.join(newname).display()
                );
            }
            if opts.shows_operations() {
                println!(
                    "renamed '{}' -> '{}'",
                    destdir.join(from_rel).display(),
                    destdir.join(newname).display()
                );
            }
        }
        return Ok(());
    }

    if opts.verbosity >= Verbosity::Debug {
        for (newname, from_rel) in &postponed {
            println!(
                "postponed '{}' ({} already exists)",
                destdir.join(from_rel).display(),
                destdir.join(newname).display()
            );
        }
    }

    let staging = tempfile::Builder::new()
        .prefix(".archive-cp-staging-")
        .tempdir_in(destdir)?;

    let mut staged = Vec::with_capacity(postponed.len());
    for (newname, from_rel) in &postponed {
        let from = destdir.join(from_rel);
        let temp_name = newname.file_name().unwrap_or(newname.as_os_str());
        let temp_path = staging.path().join(temp_name);
        link_or_copy(&from, &temp_path)?;
        staged.push((*newname, from, temp_path));
    }

    for (newname, from, temp_path) in &staged {
        let dst = destdir.join(newname);
        if dst.exists() {
            fs::remove_file(&dst)?;
        }
        fs::rename(temp_path, &dst)?;
        if opts.shows_operations() {
            println!("renamed '{}' -> '{}'", from.display(), dst.display());
        }
    }

    Ok(())
}

fn apply_external(destdir: &Path, source: &Path, newname: &Path, opts: &ApplyOptions) -> Result<()> {
    let dst = destdir.join(newname);
    if !opts.dry_run {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        if dst.exists() {
            fs::remove_file(&dst)?;
        }
        copy_file(source, &dst)?;
    }
    if opts.shows_operations() {
        println!("'{}' -> '{}'", source.display(), dst.display());
    }
    Ok(())
}

/// Old-state entries the new state doesn't keep under their current name
/// are removed. Entries that were rename sources are already gone from
/// disk by the time this runs (a direct rename is a move; a postponed
/// source survives the hardlink step and is cleaned up here).
fn remove_superseded(plan: &Plan, opts: &ApplyOptions) -> Result<()> {
    for old in &plan.old_state {
        if plan.new_state.contains_key(old) {
            continue;
        }
        let path = plan.destdir.join(old);
        let existed = path.exists();
        if !opts.dry_run && existed {
            fs::remove_file(&path)?;
        }
        if opts.shows_operations() && (existed || opts.dry_run) {
            println!("removed '{}'", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destmap::SourceMap;
    use crate::detector::DuplicateCluster;
    use crate::group::{group_by_destination, Grouped};
    use crate::plan::Planner;
    use indexmap::IndexMap;
    use std::time::{Duration, SystemTime};

    fn set_mtime(path: &Path, secs: u64) {
        let file = fs::File::open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn plan_for(target: &Path, grouped: Grouped) -> Plan {
        Planner::new(target, grouped)
            .collect::<Result<Vec<_>>>()
            .unwrap()
            .pop()
            .unwrap()
    }

    #[test]
    fn external_write_lands_new_content_and_renames_old_occupant() {
        let tmp = tempdir::TempDir::new("apply-s1").unwrap();
        let target = tmp.path().join("t");
        fs::create_dir_all(&target).unwrap();
        let old = target.join("a.txt");
        fs::write(&old, b"old").unwrap();
        set_mtime(&old, 1000);

        let src_dir = tmp.path().join("s");
        fs::create_dir_all(&src_dir).unwrap();
        let new_src = src_dir.join("a.txt");
        fs::write(&new_src, b"new").unwrap();
        set_mtime(&new_src, 2000);

        let mut sources = SourceMap::new();
        sources.insert(new_src.clone(), target.join("a.txt"));
        sources.insert(target.clone(), target.clone());

        let clusters = vec![vec![old.clone()], vec![new_src.clone()]];
        let grouped = group_by_destination(clusters, &target, &sources, false).unwrap();
        let plan = plan_for(&target, grouped);

        let opts = ApplyOptions {
            dry_run: false,
            verbosity: Verbosity::Normal,
        };
        apply_plan(&plan, &target, &opts).unwrap();

        assert_eq!(fs::read(target.join("a.txt")).unwrap(), b"new");
        let entries: Vec<_> = fs::read_dir(&target)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries.len(), 2);
        let renamed = entries.iter().find(|n| n.as_str() != "a.txt").unwrap();
        assert_eq!(fs::read(target.join(renamed)).unwrap(), b"old");
    }

    #[test]
    fn noop_leaves_file_untouched() {
        let tmp = tempdir::TempDir::new("apply-s3").unwrap();
        let target = tmp.path().join("t");
        fs::create_dir_all(&target).unwrap();
        let f = target.join("y.txt");
        fs::write(&f, b"content").unwrap();

        let sources = SourceMap::new();
        let clusters = vec![vec![f.clone()]];
        let grouped = group_by_destination(clusters, &target, &sources, false).unwrap();
        let plan = plan_for(&target, grouped);

        let opts = ApplyOptions {
            dry_run: false,
            verbosity: Verbosity::Debug,
        };
        apply_plan(&plan, &target, &opts).unwrap();

        assert_eq!(fs::read(&f).unwrap(), b"content");
    }

    #[test]
    fn postponed_swap_preserves_both_files() {
        let tmp = tempdir::TempDir::new("apply-s6").unwrap();
        let target = tmp.path().join("t");
        fs::create_dir_all(&target).unwrap();
        let a = target.join("a");
        let b = target.join("b");
        fs::write(&a, b"content-a").unwrap();
        fs::write(&b, b"content-b").unwrap();
        set_mtime(&a, 2);
        set_mtime(&b, 1);

        let mut new_state = IndexMap::new();
        new_state.insert(PathBuf::from("b"), a.clone());
        new_state.insert(PathBuf::from("a.19700101T000001"), b.clone());

        let plan = Plan {
            destdir: target.clone(),
            old_state: vec![PathBuf::from("a"), PathBuf::from("b")],
            new_state,
            unselected: Vec::new(),
        };

        let opts = ApplyOptions {
            dry_run: false,
            verbosity: Verbosity::Verbose,
        };
        apply_plan(&plan, &target, &opts).unwrap();

        assert_eq!(fs::read(target.join("b")).unwrap(), b"content-a");
        assert_eq!(fs::read(target.join("a.19700101T000001")).unwrap(), b"content-b");
        assert!(!target.join("a").exists());
    }

    #[test]
    fn dry_run_suppresses_all_mutations() {
        let tmp = tempdir::TempDir::new("apply-dryrun").unwrap();
        let target = tmp.path().join("t");
        fs::create_dir_all(&target).unwrap();
        let old = target.join("a.txt");
        fs::write(&old, b"old").unwrap();
        set_mtime(&old, 1000);

        let src_dir = tmp.path().join("s");
        fs::create_dir_all(&src_dir).unwrap();
        let new_src = src_dir.join("a.txt");
        fs::write(&new_src, b"new").unwrap();
        set_mtime(&new_src, 2000);

        let mut sources = SourceMap::new();
        sources.insert(new_src.clone(), target.join("a.txt"));
        sources.insert(target.clone(), target.clone());

        let clusters: Vec<DuplicateCluster> = vec![vec![old.clone()], vec![new_src.clone()]];
        let grouped = group_by_destination(clusters, &target, &sources, false).unwrap();
        let plan = plan_for(&target, grouped);

        let opts = ApplyOptions {
            dry_run: true,
            verbosity: Verbosity::Normal,
        };
        apply_plan(&plan, &target, &opts).unwrap();

        assert_eq!(fs::read(&old).unwrap(), b"old");
        let entries: Vec<_> = fs::read_dir(&target).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
