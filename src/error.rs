//! Error kinds for the planning and apply pipeline.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveCpError {
    /// A command-line usage problem: missing target, unreadable `--file`, etc.
    /// Surfaced by the CLI layer with exit code 2.
    #[error("{0}")]
    Usage(String),

    /// The duplicate detector subprocess could not be started, or exited
    /// non-zero.
    #[error("duplicate detector ({tool}) failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    /// The detector reported a path that isn't underneath any declared
    /// source; a contract violation between component D and E.
    #[error("path reported by duplicate detector is outside all sources: {}", .0.display())]
    UnmappedPath(PathBuf),

    /// Filesystem call failed in a way that isn't locally recoverable
    /// (`EXDEV`/`ENOTSUP` on hardlink are handled by falling back to copy,
    /// not surfaced as this variant).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The uniquification escalation exhausted both the timestamp and
    /// checksum phases without producing a unique name, and the final
    /// promotion step could not resolve the remaining collision.
    #[error("cannot disambiguate {}: files are indistinguishable by name, mtime, and content hash", .0.display())]
    IndistinguishableFiles(PathBuf),
}

impl ArchiveCpError {
    pub fn external_tool_spawn(tool: &str, err: io::Error) -> Self {
        ArchiveCpError::ExternalTool {
            tool: tool.to_owned(),
            reason: err.to_string(),
        }
    }

    pub fn external_tool_status(tool: &str, status: ExitStatus) -> Self {
        ArchiveCpError::ExternalTool {
            tool: tool.to_owned(),
            reason: format!("exited with {status}"),
        }
    }

    /// Process exit code this error should produce: 2 for usage errors,
    /// 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            ArchiveCpError::Usage(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveCpError>;
