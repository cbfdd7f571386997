//! Command-line interface definitions

use crate::config::CopyOptions;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

/// Recursively copy a file or directory tree
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Source file or directory
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Destination path, or an existing directory to copy into
    #[arg(value_name = "DEST")]
    pub destination: PathBuf,

    /// Replace destination entries whose type conflicts with the source
    ///
    /// Without this flag a directory is never replaced by a file, and an
    /// existing non-directory is never replaced by a directory.
    #[arg(short, long)]
    pub force: bool,

    /// Copy the contents of regular files that symlinks point to
    ///
    /// Symlinks to anything other than a regular file are rejected.
    #[arg(short = 'l', long, short_alias = 'L', alias = "dereference")]
    pub follow_symlinks: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Validate command-line arguments
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The source path does not exist
    /// - Both --quiet and --verbose options are used
    pub fn validate(&self) -> Result<()> {
        if self.quiet && self.verbose > 0 {
            anyhow::bail!("Cannot use both --quiet and --verbose options");
        }

        // A dangling symlink is still a valid source
        if self.source.symlink_metadata().is_err() {
            anyhow::bail!("Source path does not exist: {}", self.source.display());
        }

        Ok(())
    }

    /// Engine options selected by the flags
    #[must_use]
    pub fn copy_options(&self) -> CopyOptions {
        CopyOptions::new()
            .with_force_rewrite(self.force)
            .with_follow_symlinks(self.follow_symlinks)
    }

    /// Maximum log level selected by `-q`/`-v`
    #[must_use]
    pub const fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}
