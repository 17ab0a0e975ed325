use archive_cp::apply::Verbosity;
use archive_cp::{run, Cli, RunOptions};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    let (sources, target) = match cli.sources_and_target() {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("archive-cp: {err}");
            return ExitCode::from(err.exit_code() as u8);
        },
    };

    let verbosity = if cli.debug {
        Verbosity::Debug
    } else if cli.verbose {
        Verbosity::Verbose
    } else if cli.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };

    if cli.dry_run && verbosity != Verbosity::Quiet {
        println!("Dry run. No files will be changed.");
    }

    let opts = RunOptions {
        dry_run: cli.dry_run,
        ignore_case: cli.ignore_case,
        quiet: cli.quiet,
        verbosity,
    };

    match run(&sources, &target, opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("archive-cp: {err}");
            ExitCode::from(err.exit_code() as u8)
        },
    }
}
