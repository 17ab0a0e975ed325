//! Recognises and produces the two filename suffix forms this tool's own
//! runs introduce, so that re-archiving an already-archived tree is
//! idempotent (see the crate-level docs for the `TIME` and `TIME+CHK`
//! forms).

use crate::fileutils::sha256sum_prefix8;
use std::io;
use std::path::Path;

const TIME_LEN: usize = "YYYYMMDDTHHMMSS".len();
const CHK_LEN: usize = 8;

fn is_time_token(s: &str) -> bool {
    if s.len() != TIME_LEN {
        return false;
    }
    let bytes = s.as_bytes();
    bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'T'
        && bytes[9..].iter().all(u8::is_ascii_digit)
}

fn is_chk_token(s: &str) -> bool {
    s.len() == CHK_LEN && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// `name` with the longest matching historical suffix form removed.
/// Matching is tried `TIME+CHK` then `TIME`; names matching neither are
/// returned unchanged. This is what the planner uses as the "natural" key
/// for bucketing and for the newest file's retained name.
pub fn base_name(name: &str) -> String {
    strip_time_chk(name)
        .or_else(|| strip_time(name))
        .unwrap_or_else(|| name.to_owned())
}

fn strip_time_chk(name: &str) -> Option<String> {
    let parts: Vec<&str> = name.split('.').collect();
    let n = parts.len();
    if n >= 3 && is_time_token(parts[n - 2]) && is_chk_token(parts[n - 1]) {
        return Some(parts[..n - 2].join("."));
    }
    if n >= 4 && is_time_token(parts[n - 3]) && is_chk_token(parts[n - 2]) {
        let stem = parts[..n - 3].join(".");
        return Some(format!("{stem}.{}", parts[n - 1]));
    }
    None
}

fn strip_time(name: &str) -> Option<String> {
    let parts: Vec<&str> = name.split('.').collect();
    let n = parts.len();
    if n >= 2 && is_time_token(parts[n - 1]) {
        return Some(parts[..n - 1].join("."));
    }
    if n >= 3 && is_time_token(parts[n - 2]) {
        let stem = parts[..n - 2].join(".");
        return Some(format!("{stem}.{}", parts[n - 1]));
    }
    None
}

fn stem_and_ext(name: &str) -> (String, String) {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_owned());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}

/// `<name.stem>.<mtime in YYYYMMDDTHHMMSS UTC>.<name.ext>`
pub fn add_time_stem_suffix(path: &Path, name: &str) -> io::Result<String> {
    let (stem, ext) = stem_and_ext(name);
    let timestamp = crate::pathutils::mtime(path)?.format("%Y%m%dT%H%M%S");
    Ok(format!("{stem}.{timestamp}{ext}"))
}

/// `<name.stem>.<first 8 hex of SHA-256(path)>.<name.ext>`
pub fn add_chksum_stem_suffix(path: &Path, name: &str) -> io::Result<String> {
    let (stem, ext) = stem_and_ext(name);
    let chksum = sha256sum_prefix8(path)?;
    Ok(format!("{stem}.{chksum}{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};

    #[test]
    fn base_name_strips_time_only_suffix() {
        assert_eq!(base_name("report.20230615T120000.txt"), "report.txt");
    }

    #[test]
    fn base_name_strips_time_only_suffix_no_ext() {
        assert_eq!(base_name("report.20230615T120000"), "report");
    }

    #[test]
    fn base_name_strips_time_and_chksum_suffix() {
        assert_eq!(base_name("report.20230615T120000.ab12cd34.txt"), "report.txt");
    }

    #[test]
    fn base_name_strips_time_and_chksum_suffix_no_ext() {
        assert_eq!(base_name("report.20230615T120000.ab12cd34"), "report");
    }

    #[test]
    fn base_name_preserves_dots_in_stem() {
        assert_eq!(
            base_name("archive.backup.old.20230615T120000.txt"),
            "archive.backup.old.txt"
        );
    }

    #[test]
    fn base_name_leaves_unsuffixed_names_alone() {
        assert_eq!(base_name("report.txt"), "report.txt");
        assert_eq!(base_name("report"), "report");
        assert_eq!(base_name("no-suffix-here.tar.gz"), "no-suffix-here.tar.gz");
    }

    #[test]
    fn add_time_stem_suffix_is_a_left_inverse_of_base_name() {
        let dir = tempdir::TempDir::new("namegrammar-time").unwrap();
        let path = dir.path().join("report.txt");
        fs::write(&path, b"x").unwrap();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1000);
        set_modified(&path, mtime);

        let suffixed = add_time_stem_suffix(&path, "report.txt").unwrap();
        assert_eq!(suffixed, "report.19700101T001640.txt");
        assert_eq!(base_name(&suffixed), "report.txt");
    }

    #[test]
    fn add_chksum_stem_suffix_is_a_left_inverse_of_base_name() {
        let dir = tempdir::TempDir::new("namegrammar-chk").unwrap();
        let path = dir.path().join("report.txt");
        fs::write(&path, b"hello").unwrap();

        let suffixed = add_chksum_stem_suffix(&path, "report.txt").unwrap();
        assert!(suffixed.starts_with("report."));
        assert!(suffixed.ends_with(".txt"));
        assert_eq!(base_name(&suffixed), "report.txt");
    }

    fn set_modified(path: &std::path::Path, mtime: SystemTime) {
        let file = fs::File::open(path).unwrap();
        file.set_modified(mtime).unwrap();
    }
}
