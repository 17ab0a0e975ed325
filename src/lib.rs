//! `archive-cp`: a file archival copy utility.
//!
//! Given source files/directories and a target archival directory, this
//! crate materialises the sources into the target while guaranteeing that
//! no data is lost to filename collisions or overwrites: it collapses
//! content-identical duplicates to a single archived copy, preserves every
//! distinct file that would otherwise collide on name via deterministic
//! suffixing, and keeps the newest file unsuffixed whenever the target
//! already holds something at that name.
//!
//! The pipeline mirrors the component breakdown documented in `DESIGN.md`:
//! [`destmap`] builds the source→destination map, [`detector`] clusters
//! content-identical files via an external subprocess, [`group`] buckets
//! those clusters by destination, [`plan`] turns each bucket into a
//! conflict-free [`plan::Plan`], and [`apply`] applies each plan to the
//! filesystem.

pub mod apply;
mod cli;
pub mod destmap;
pub mod detector;
pub mod error;
pub mod fileutils;
pub mod group;
pub mod namegrammar;
pub mod pathutils;
pub mod plan;

pub use cli::Cli;
pub use error::{ArchiveCpError, Result};

use apply::{apply_plan, ApplyOptions, Verbosity};
use destmap::build_source_map;
use detector::detect_duplicates;
use group::group_by_destination;
use plan::Planner;
use std::fs;
use std::path::{Path, PathBuf};

/// Switches that are orthogonal to the planning logic: how much gets
/// logged, whether the filesystem is actually touched, and whether
/// destination bucketing folds case.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub dry_run: bool,
    pub ignore_case: bool,
    pub quiet: bool,
    pub verbosity: Verbosity,
}

/// Component I, the driver: composes A–H once per invocation.
///
/// `sources` are the raw (uncanonicalised) command-line source arguments,
/// in the order given; `target` is the archival directory, created if it
/// does not already exist. Canonicalisation happens here, once, at
/// ingress — everything downstream assumes absolute, symlink-resolved
/// paths (see [`pathutils`]).
pub fn run(sources: &[String], target: &str, opts: RunOptions) -> Result<()> {
    let target = canonicalize_target(Path::new(target))?;
    log::debug!("target: {}", target.display());

    let mut canonical_sources = Vec::with_capacity(sources.len());
    for raw in sources {
        let path = fs::canonicalize(raw).map_err(ArchiveCpError::Io)?;
        canonical_sources.push((path, raw.clone()));
    }

    let source_map = build_source_map(&target, canonical_sources);
    log::debug!("{} source(s) mapped into {}", source_map.len(), target.display());

    let all_paths: Vec<PathBuf> = source_map.keys().cloned().collect();
    let clusters = detect_duplicates(&all_paths, opts.quiet)?;
    log::debug!("detector reported {} cluster(s)", clusters.len());

    let grouped = group_by_destination(clusters, &target, &source_map, opts.ignore_case)?;
    log::debug!("{} destination bucket(s) to plan", grouped.len());

    let apply_opts = ApplyOptions {
        dry_run: opts.dry_run,
        verbosity: opts.verbosity,
    };

    for plan in Planner::new(&target, grouped) {
        let plan = plan?;
        apply_plan(&plan, &target, &apply_opts)?;
    }

    Ok(())
}

/// Canonicalises `target`, creating it first if it doesn't yet exist —
/// `fs::canonicalize` requires the path to exist, and a first archival run
/// into a fresh directory is the common case.
fn canonicalize_target(target: &Path) -> Result<PathBuf> {
    if !target.exists() {
        fs::create_dir_all(target)?;
    }
    Ok(fs::canonicalize(target)?)
}
