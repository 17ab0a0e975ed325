//! Turns grouped duplicate clusters into concrete, conflict-free plans: one
//! [`Plan`] per destination bucket, picking a representative per cluster,
//! choosing which representative keeps the natural name, and disambiguating
//! the rest by escalating suffixes.

use crate::detector::DuplicateCluster;
use crate::error::{ArchiveCpError, Result};
use crate::group::Grouped;
use crate::namegrammar::{add_chksum_stem_suffix, add_time_stem_suffix, base_name};
use crate::pathutils::{is_relative_to, mtime};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// One destination directory's worth of filesystem operations.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Absolute directory under `target` these entries live in.
    pub destdir: PathBuf,
    /// Filenames (relative to `destdir`) already on disk there that
    /// participate in this bucket.
    pub old_state: Vec<PathBuf>,
    /// Filename (relative to `destdir`) to the absolute source path that
    /// should occupy it.
    pub new_state: IndexMap<PathBuf, PathBuf>,
    /// Duplicates discarded by representative selection, plus paths
    /// discarded because even full disambiguation could not separate them
    /// from an equal twin. Never deleted by the planner itself.
    pub unselected: Vec<PathBuf>,
}

/// Lazily yields one [`Plan`] per destination bucket, in the grouping map's
/// iteration order.
pub struct Planner {
    target: PathBuf,
    iter: indexmap::map::IntoIter<PathBuf, Vec<DuplicateCluster>>,
}

impl Planner {
    pub fn new(target: &Path, grouped: Grouped) -> Self {
        Planner {
            target: target.to_path_buf(),
            iter: grouped.into_iter(),
        }
    }
}

impl Iterator for Planner {
    type Item = Result<Plan>;

    fn next(&mut self) -> Option<Self::Item> {
        let (relpath, clusters) = self.iter.next()?;
        Some(plan_bucket(&self.target, &relpath, clusters))
    }
}

fn plan_bucket(target: &Path, relpath: &Path, clusters: Vec<DuplicateCluster>) -> Result<Plan> {
    let parent = relpath.parent().unwrap_or_else(|| Path::new(""));
    let destdir = target.join(parent);

    let mut old_state = Vec::new();
    for cluster in &clusters {
        for member in cluster {
            if is_relative_to(member, &destdir) {
                let rel = member
                    .strip_prefix(&destdir)
                    .expect("is_relative_to checked this");
                old_state.push(rel.to_path_buf());
            }
        }
    }

    let mut files = Vec::with_capacity(clusters.len());
    let mut unselected = Vec::new();
    for cluster in &clusters {
        if cluster.len() > 1 {
            let (representative, rest) = select_representative(cluster, target)?;
            files.push(representative);
            unselected.extend(rest);
        } else {
            files.push(cluster[0].clone());
        }
    }

    let mut by_mtime_desc = with_mtimes(files)?;
    by_mtime_desc.sort_by(|a, b| b.0.cmp(&a.0));
    let mut by_mtime_desc = by_mtime_desc.into_iter().map(|(_, p)| p);

    let newest = by_mtime_desc
        .next()
        .expect("every bucket has at least one cluster");
    let rest: Vec<PathBuf> = by_mtime_desc.collect();

    let newest_filename = filename_of(&newest);
    let newest_key = base_name(&newest_filename);

    let (uniques, discarded) = unique_names(&rest)?;

    let mut new_state: IndexMap<PathBuf, PathBuf> = IndexMap::new();
    new_state.insert(PathBuf::from(newest_key), newest);
    for (name, path) in uniques {
        new_state.insert(PathBuf::from(name), path);
    }

    unselected.extend(discarded);

    Ok(Plan {
        destdir,
        old_state,
        new_state,
        unselected,
    })
}

fn filename_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn with_mtimes(paths: Vec<PathBuf>) -> Result<Vec<(DateTime<Utc>, PathBuf)>> {
    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        let mt = mtime(&p)?;
        out.push((mt, p));
    }
    Ok(out)
}

/// Pick one representative from a cluster of duplicates: stable-sorted by
/// path, then by target-membership (in-target first), then by mtime
/// ascending — the oldest wins, ties broken by target-membership, further
/// ties by path.
fn select_representative(
    cluster: &[PathBuf],
    target: &Path,
) -> Result<(PathBuf, Vec<PathBuf>)> {
    let mut members = cluster.to_vec();
    members.sort();
    members.sort_by_key(|p| !is_relative_to(p, target));

    let mut with_mtime = with_mtimes(members)?;
    with_mtime.sort_by_key(|(mt, _)| *mt);

    let mut iter = with_mtime.into_iter().map(|(_, p)| p);
    let representative = iter.next().expect("cluster is non-empty");
    Ok((representative, iter.collect()))
}

/// Disambiguate every path in `paths` (representatives other than the
/// bucket's newest, which already reserved the unsuffixed natural name) by
/// escalating timestamp, then checksum, suffixes. Returns the resolved
/// `filename -> path` assignments and any paths that remained
/// indistinguishable even after both phases.
fn unique_names(paths: &[PathBuf]) -> Result<(IndexMap<String, PathBuf>, Vec<PathBuf>)> {
    let mut uniques: IndexMap<String, PathBuf> = IndexMap::new();
    let mut by_name: IndexMap<String, Vec<PathBuf>> = IndexMap::new();

    for path in paths {
        let name = base_name(&filename_of(path));
        by_name.entry(name).or_default().push(path.clone());
    }

    increase_uniqueness(&mut by_name, &mut uniques, |p, n| {
        add_time_stem_suffix(p, n)
    })?;
    increase_uniqueness(&mut by_name, &mut uniques, |p, n| {
        add_chksum_stem_suffix(p, n)
    })?;

    resolve_residual(by_name, uniques)
}

/// After both escalation phases, promote the first member of each
/// remaining bucket to `uniques` (if its key is still free) and discard the
/// rest. A key that is already claimed here means escalation produced a
/// name that collides with an earlier unique assignment, which the
/// algorithm must prevent by construction.
fn resolve_residual(
    by_name: IndexMap<String, Vec<PathBuf>>,
    mut uniques: IndexMap<String, PathBuf>,
) -> Result<(IndexMap<String, PathBuf>, Vec<PathBuf>)> {
    let mut discarded = Vec::new();
    for (newname, group) in by_name {
        let mut iter = group.into_iter();
        let Some(keep) = iter.next() else {
            continue;
        };
        if uniques.contains_key(&newname) {
            return Err(ArchiveCpError::IndistinguishableFiles(PathBuf::from(
                newname,
            )));
        }
        uniques.insert(newname, keep);
        discarded.extend(iter);
    }

    Ok((uniques, discarded))
}

/// One escalation pass: every candidate currently in `by_name` is renamed
/// via `namefunc`. Candidates that land on a name free of both `uniques`
/// and sibling collisions are promoted; the rest are re-bucketed under
/// their new name for the next phase (or the final promotion sweep).
///
/// `by_name` is mutated in place: each bucket's key is snapshotted before
/// the loop starts (so later insertions from this same pass aren't
/// revisited), each processed bucket is drained, and leftover collisions
/// are merged back in under their escalated names, accumulating across
/// keys that now happen to coincide.
fn increase_uniqueness(
    by_name: &mut IndexMap<String, Vec<PathBuf>>,
    uniques: &mut IndexMap<String, PathBuf>,
    namefunc: impl Fn(&Path, &str) -> std::io::Result<String>,
) -> Result<()> {
    let keys: Vec<String> = by_name.keys().cloned().collect();

    for newname in keys {
        let paths = match by_name.get_mut(&newname) {
            Some(p) if !p.is_empty() => std::mem::take(p),
            _ => continue,
        };

        let mut by_newname: IndexMap<String, Vec<PathBuf>> = IndexMap::new();
        for path in paths {
            let candidate = namefunc(&path, &newname)?;
            by_newname.entry(candidate).or_default().push(path);
        }

        for (candidate_name, candidate_paths) in by_newname {
            if candidate_paths.len() == 1 && !uniques.contains_key(&candidate_name) {
                uniques.insert(candidate_name, candidate_paths.into_iter().next().unwrap());
            } else {
                by_name
                    .entry(candidate_name)
                    .or_default()
                    .extend(candidate_paths);
            }
        }
    }

    by_name.retain(|_, v| !v.is_empty());
    Ok(())
}
