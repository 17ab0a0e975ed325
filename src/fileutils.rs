//! Streaming content hashing and filesystem primitives used by planning and
//! apply: SHA-256, hardlink-or-copy, and atomic rename-into-place.

use filetime::{set_file_mtime, FileTime};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

const HASH_BUFFER_SIZE: usize = 128 * 1024;

/// Streaming SHA-256 of `path`'s contents, read in 128 KiB blocks.
pub fn sha256sum(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// First 8 hex characters of `sha256sum(path)`.
pub fn sha256sum_prefix8(path: &Path) -> io::Result<String> {
    let digest = sha256sum(path)?;
    Ok(digest.iter().take(4).map(|b| format!("{b:02x}")).collect())
}

/// Hardlink `src` to `dst`, falling back to a metadata-preserving copy when
/// the filesystem can't hardlink across the boundary (`EXDEV`) or doesn't
/// support hardlinks at all (`ENOTSUP`/`Unsupported`).
pub fn link_or_copy(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::hard_link(src, dst) {
        Ok(()) => Ok(()),
        Err(err) if is_exdev(&err) || err.kind() == io::ErrorKind::Unsupported => {
            copy_with_metadata(src, dst)
        },
        Err(err) => Err(err),
    }
}

#[cfg(unix)]
fn is_exdev(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_exdev(_err: &io::Error) -> bool {
    false
}

fn copy_with_metadata(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst)?;
    let src_meta = fs::symlink_metadata(src)?;
    if let Ok(modified) = src_meta.modified() {
        set_file_mtime(dst, FileTime::from_system_time(modified))?;
    }
    Ok(())
}

/// Copy `src` to `dst` via hardlink-or-copy into a same-directory temp file,
/// then an atomic rename into place. This guarantees an observer never sees
/// a partially-written `dst`.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    let parent = dst.parent().unwrap_or_else(|| Path::new("."));
    let file_name = dst
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("archive-cp");
    let tmp = tempfile::Builder::new()
        .prefix(&format!("{file_name}."))
        .tempfile_in(parent)?;
    let tmp_path = tmp.path().to_path_buf();
    // Close the placeholder so link_or_copy can (re)create the path itself;
    // on the EXDEV fallback path fs::copy requires the destination not to
    // already exist as an open handle we're racing with.
    drop(tmp);
    fs::remove_file(&tmp_path).ok();

    link_or_copy(src, &tmp_path)?;

    if dst.exists() {
        fs::remove_file(dst)?;
    }
    fs::rename(&tmp_path, dst)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        let dir = tempdir::TempDir::new("fileutils-sha").unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();
        let digest = sha256sum(&path).unwrap();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn prefix8_is_first_four_bytes() {
        let dir = tempdir::TempDir::new("fileutils-prefix").unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"hello").unwrap();
        let full = sha256sum(&path).unwrap();
        let want: String = full.iter().take(4).map(|b| format!("{b:02x}")).collect();
        assert_eq!(sha256sum_prefix8(&path).unwrap(), want);
    }

    #[test]
    fn copy_file_preserves_content_and_leaves_no_temp() {
        let dir = tempdir::TempDir::new("fileutils-copy").unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"payload").unwrap();

        copy_file(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"payload");
        let leftover: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .filter(|n| n != "src" && n != "dst")
            .collect();
        assert!(leftover.is_empty(), "leftover temp entries: {leftover:?}");
    }

    #[test]
    fn copy_file_overwrites_existing_destination() {
        let dir = tempdir::TempDir::new("fileutils-overwrite").unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"new").unwrap();
        fs::write(&dst, b"old").unwrap();

        copy_file(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"new");
    }

    #[test]
    fn link_or_copy_produces_identical_content() {
        let dir = tempdir::TempDir::new("fileutils-link").unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"linked").unwrap();

        link_or_copy(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"linked");
    }
}
