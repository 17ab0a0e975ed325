//! Maps absolute source paths onto their destination under the target
//! directory.

use crate::error::{ArchiveCpError, Result};
use crate::pathutils::is_relative_to;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Ordered mapping from an absolute source path to its absolute intended
/// top-level destination. Insertion order is preserved since the driver's
/// CLI-argument order is part of what makes a run reproducible.
pub type SourceMap = IndexMap<PathBuf, PathBuf>;

/// Build the [`SourceMap`] for one invocation.
///
/// A directory source ending in `/.` (its "copy contents" marker) maps to
/// the target directory itself; any other file or directory source maps to
/// `target/<basename-of-source>`. If `target` already exists, it is also
/// inserted mapping to itself so existing target contents participate in
/// deduplication.
pub fn build_source_map<I, S>(target: &Path, sources: I) -> SourceMap
where
    I: IntoIterator<Item = (PathBuf, S)>,
    S: AsRef<str>,
{
    let mut map = SourceMap::new();
    for (source, orig_arg) in sources {
        if source.is_dir() && orig_arg.as_ref().ends_with("/.") {
            map.insert(source, target.to_path_buf());
        } else {
            let basename = source
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| source.clone());
            map.insert(source, target.join(basename));
        }
    }
    if target.exists() {
        map.insert(target.to_path_buf(), target.to_path_buf());
    }
    map
}

/// Resolve the destination `p` would occupy under `target`, given `sources`.
///
/// 1. An exact key match wins.
/// 2. Otherwise, the nearest directory source that `p` descends from.
/// 3. Otherwise, [`ArchiveCpError::UnmappedPath`] — the detector returned a
///    path outside every declared source, a contract violation.
pub fn destination_of(p: &Path, sources: &SourceMap) -> Result<PathBuf> {
    if let Some(dest) = sources.get(p) {
        return Ok(dest.clone());
    }
    for (source, dest) in sources {
        if source.is_dir() && is_relative_to(p, source) {
            let relative = p.strip_prefix(source).expect("is_relative_to checked this");
            return Ok(dest.join(relative));
        }
    }
    Err(ArchiveCpError::UnmappedPath(p.to_path_buf()))
}
