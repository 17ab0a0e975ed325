//! Adaptor around the external, `fclones`-style content-duplicate detector.
//!
//! The detector is an external tool the core treats as a collaborator: we
//! feed it a newline-separated list of absolute paths on stdin and parse its
//! "fdupes"-format grouped output back into [`DuplicateCluster`]s.

use crate::error::{ArchiveCpError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A non-empty set of paths whose file contents are byte-identical.
pub type DuplicateCluster = Vec<PathBuf>;

const DEFAULT_TOOL: &str = "fclones";

/// Invoke the duplicate detector on `paths`, returning one cluster per
/// group it reports (including singleton groups for files with no
/// duplicates, since we ask it to emit those too).
pub fn detect_duplicates(paths: &[PathBuf], quiet: bool) -> Result<Vec<DuplicateCluster>> {
    detect_duplicates_with(DEFAULT_TOOL, paths, quiet)
}

fn detect_duplicates_with(
    tool: &str,
    paths: &[PathBuf],
    quiet: bool,
) -> Result<Vec<DuplicateCluster>> {
    let stderr = if quiet {
        Stdio::null()
    } else {
        Stdio::inherit()
    };

    let mut child = Command::new(tool)
        .args(["group", "-f", "fdupes", "--stdin", "-H", "--rf-over=0", "--min=0"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(stderr)
        .spawn()
        .map_err(|err| ArchiveCpError::external_tool_spawn(tool, err))?;

    let mut stdin = child.stdin.take().expect("stdin was requested as piped");
    let input = encode_paths(paths);
    let writer = std::thread::spawn(move || stdin.write_all(&input));

    let output = child
        .wait_with_output()
        .map_err(|err| ArchiveCpError::external_tool_spawn(tool, err))?;
    let _ = writer.join();

    if !output.status.success() {
        return Err(ArchiveCpError::external_tool_status(tool, output.status));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_fdupes(&stdout))
}

fn encode_paths(paths: &[PathBuf]) -> Vec<u8> {
    let mut buf = Vec::new();
    for p in paths {
        buf.extend_from_slice(p.to_string_lossy().as_bytes());
        buf.push(b'\n');
    }
    buf
}

/// Parse fdupes-format output: blocks of one-per-line absolute paths
/// separated by blank lines. Trailing CR is trimmed. Leading/trailing empty
/// blocks are skipped.
pub fn parse_fdupes(output: &str) -> Vec<DuplicateCluster> {
    let mut groups = Vec::new();
    let mut block: DuplicateCluster = Vec::new();
    for line in output.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            if !block.is_empty() {
                groups.push(std::mem::take(&mut block));
            }
        } else {
            block.push(Path::new(line).to_path_buf());
        }
    }
    if !block.is_empty() {
        groups.push(block);
    }
    groups
}
