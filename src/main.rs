//! treecopy: recursively copy a file or directory tree
//!
//! Exit status is 0 on success, 2 when an entry cannot be opened, 3 when
//! file data cannot be transferred, and 1 for every other failure.

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing::info;
use treecopy::cli::Args;
use treecopy::sync::sync_paths;
use treecopy::SyncError;

fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = args.validate().context("Invalid arguments") {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    info!("Starting treecopy v{}", env!("CARGO_PKG_VERSION"));
    info!("Options: {:?}", args.copy_options());

    match sync_paths(&args.source, &args.destination, args.copy_options()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    // dirfd-fs reports through `log`
    tracing_log::LogTracer::init().context("Failed to forward log records")?;

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install the log subscriber")
}

fn report(err: &SyncError) {
    match err {
        SyncError::Copy(e) => eprintln!("Error: {:?}: {e}", e.kind()),
        SyncError::Resolve(e) => eprintln!("Error: {e}"),
    }
}
