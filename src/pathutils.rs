//! Ancestry tests and modification-time extraction.
//!
//! All comparisons here operate on already-canonicalised paths; nothing in
//! this module canonicalises on your behalf.

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;

/// True if `path` is `directory` itself or lies somewhere underneath it.
///
/// Lexical `starts_with` alone is wrong here: `/a/bc` lexically starts with
/// `/a/b`, but `bc` is not a descendant of `b`. We compare against the
/// directory's string form with a trailing separator appended, which rules
/// that case out without needing to touch the filesystem again.
pub fn is_relative_to(path: &Path, directory: &Path) -> bool {
    if path == directory {
        return true;
    }
    let mut prefix = directory.to_string_lossy().into_owned();
    if !prefix.ends_with(std::path::MAIN_SEPARATOR) {
        prefix.push(std::path::MAIN_SEPARATOR);
    }
    path.to_string_lossy().starts_with(&prefix)
}

/// Modification time of `path`, as a UTC instant.
///
/// Uses `symlink_metadata` so that a symlink's own mtime is reported rather
/// than the mtime of whatever it points at; callers that want to dedupe
/// symlink targets should resolve the path themselves first.
pub fn mtime(path: &Path) -> io::Result<DateTime<Utc>> {
    let meta = fs::symlink_metadata(path)?;
    let modified = meta.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn ancestry_exact_match() {
        let p: PathBuf = "/a/b".into();
        assert!(is_relative_to(&p, &p));
    }

    #[test]
    fn ancestry_true_descendant() {
        assert!(is_relative_to(Path::new("/a/b/c"), Path::new("/a/b")));
    }

    #[test]
    fn ancestry_false_for_sibling_with_shared_prefix() {
        assert!(!is_relative_to(Path::new("/a/bc"), Path::new("/a/b")));
    }

    #[test]
    fn ancestry_false_for_unrelated_paths() {
        assert!(!is_relative_to(Path::new("/x/y"), Path::new("/a/b")));
    }

    #[test]
    fn mtime_reads_real_file() {
        let dir = tempdir::TempDir::new("pathutils-mtime").unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"hi").unwrap();
        assert!(mtime(&file).is_ok());
    }
}
