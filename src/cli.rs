//! Command-line front end. Parses flags into a [`Cli`], which the binary
//! (`src/bin.rs`) turns into a [`crate::RunOptions`] and a source/target
//! pair before handing off to [`crate::run`].

use crate::error::{ArchiveCpError, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;

/// Archival copy utility: deduplicates content-identical files and never
/// overwrites on collision.
#[derive(Parser, Debug)]
#[command(name = "archive-cp", version, about, long_about = None)]
pub struct Cli {
    /// Read additional source paths, one per line, from PATH ('-' for stdin)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Plan only; do not mutate the filesystem
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Case-insensitive destination bucketing
    #[arg(short = 'i', long = "ignore-case")]
    pub ignore_case: bool,

    /// Suppress detector stderr and info output
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Log each applied operation
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Log skip/postpone/unselected messages in addition to -v
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Source files/directories, followed by the target archival directory
    #[arg(required = true, num_args = 1.., value_name = "SOURCE_FILE... TARGET_DIRECTORY")]
    pub paths: Vec<String>,
}

impl Cli {
    /// Splits `paths` into the leading sources and the trailing target,
    /// then folds in anything named by `--file`. `--file` entries are
    /// appended after the positional sources, matching the upstream
    /// Python driver's `source_files = list(source_files) + [...]`.
    ///
    /// An unreadable `--file` is a [`ArchiveCpError::Usage`], per §7: it's
    /// a CLI-layer problem the user can fix by pointing at a real path, not
    /// a mid-run I/O failure.
    pub fn sources_and_target(&self) -> Result<(Vec<String>, String)> {
        let mut paths = self.paths.clone();
        let target = paths.pop().expect("clap enforces at least one path");
        let mut sources = paths;

        if let Some(file) = &self.file {
            sources.extend(read_source_list(file)?);
        }

        Ok((sources, target))
    }
}

fn read_source_list(path: &std::path::Path) -> Result<Vec<String>> {
    let lines: Box<dyn Iterator<Item = std::io::Result<String>>> = if path.as_os_str() == "-" {
        Box::new(std::io::stdin().lines())
    } else {
        let file = std::fs::File::open(path).map_err(|err| {
            ArchiveCpError::Usage(format!("cannot read {}: {err}", path.display()))
        })?;
        Box::new(std::io::BufReader::new(file).lines())
    };

    let mut out = Vec::new();
    for line in lines {
        let line = line.map_err(|err| {
            ArchiveCpError::Usage(format!("cannot read {}: {err}", path.display()))
        })?;
        if !line.is_empty() {
            out.push(line);
        }
    }
    Ok(out)
}
