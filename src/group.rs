//! Buckets duplicate clusters by the destination path their members would
//! naturally occupy under the target directory.

use crate::destmap::{destination_of, SourceMap};
use crate::detector::DuplicateCluster;
use crate::error::Result;
use crate::namegrammar::base_name;
use crate::pathutils::is_relative_to;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// `relpath -> list of clusters whose members all map to that destination`.
/// A single input cluster may contribute to more than one bucket if its
/// members disagree on destination (e.g. two differently-named files that
/// happen to be byte-identical).
pub type Grouped = IndexMap<PathBuf, Vec<DuplicateCluster>>;

pub fn group_by_destination(
    clusters: Vec<DuplicateCluster>,
    target: &Path,
    sources: &SourceMap,
    ignore_case: bool,
) -> Result<Grouped> {
    let mut by_relpath: Grouped = IndexMap::new();

    for cluster in clusters {
        let mut regrouped: IndexMap<PathBuf, DuplicateCluster> = IndexMap::new();
        for member in cluster {
            let mut key = sub_bucket_key(&member, target, sources)?;
            if ignore_case {
                key = PathBuf::from(key.to_string_lossy().to_lowercase());
            }
            regrouped.entry(key).or_default().push(member);
        }
        for (key, members) in regrouped {
            by_relpath.entry(key).or_default().push(members);
        }
    }

    Ok(by_relpath)
}

fn sub_bucket_key(member: &Path, target: &Path, sources: &SourceMap) -> Result<PathBuf> {
    if is_relative_to(member, target) {
        let relative = member
            .strip_prefix(target)
            .expect("is_relative_to checked this");
        let natural = base_name(&relative.to_string_lossy());
        Ok(PathBuf::from(natural))
    } else {
        let dest = destination_of(member, sources)?;
        Ok(dest
            .strip_prefix(target)
            .unwrap_or(&dest)
            .to_path_buf())
    }
}
