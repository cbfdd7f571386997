//! Whole-run orchestration
//!
//! A run has two phases:
//! 1. **Resolution**: classify the two user paths and open their parent
//!    directories ([`crate::resolve::plan_copy`])
//! 2. **Copy**: hand the resulting [`CopyRoot`] to the tree copier
//!
//! # Usage
//!
//! ```rust,no_run
//! use treecopy::sync::sync_paths;
//! use treecopy::CopyOptions;
//! use std::path::Path;
//!
//! let stats = sync_paths(Path::new("src"), Path::new("out"), CopyOptions::new())?;
//! println!("copied {} files ({} bytes) in {:?}",
//!          stats.copied.files_copied, stats.copied.bytes_copied, stats.duration);
//! # Ok::<(), treecopy::SyncError>(())
//! ```

use crate::config::CopyOptions;
use crate::directory::{CopyStats, TreeCopier};
use crate::error::SyncError;
use crate::resolve::{plan_copy, CopyRoot};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Statistics for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// Per-kind counters from the tree copier
    pub copied: CopyStats,

    /// Wall time of the run, resolution included
    pub duration: Duration,
}

/// Copy `source` to `destination` the way `cp -r` places it
///
/// # Errors
///
/// Returns [`SyncError::Resolve`] when the path pair is rejected before any
/// write, or [`SyncError::Copy`] with the first failure of the copy itself.
pub fn sync_paths(
    source: &Path,
    destination: &Path,
    options: CopyOptions,
) -> Result<SyncStats, SyncError> {
    let start_time = Instant::now();

    info!(
        "Starting copy from {} to {}",
        source.display(),
        destination.display()
    );

    let root = plan_copy(source, destination)?;
    info!("Plan: {:?} -> {}", root.plan, root.dest_path().display());

    let copied = copy_root(&root, options).inspect_err(|e| {
        error!("Copy failed ({:?}): {}", e.kind(), e);
    })?;

    let stats = SyncStats {
        copied,
        duration: start_time.elapsed(),
    };

    info!("Copy completed in {:?}", stats.duration);
    info!(
        "Files copied: {}, Bytes copied: {}, Symlinks: {}, Special files: {}, Directories: {}",
        stats.copied.files_copied,
        stats.copied.bytes_copied,
        stats.copied.symlinks_copied,
        stats.copied.special_files_copied,
        stats.copied.directories_copied
    );

    Ok(stats)
}

fn copy_root(root: &CopyRoot, options: CopyOptions) -> crate::error::Result<CopyStats> {
    let mut copier = TreeCopier::new(options);
    copier.copy_path(
        &root.source_parent,
        &root.source_name,
        &root.dest_parent,
        &root.dest_name,
    )?;
    Ok(copier.into_stats())
}
