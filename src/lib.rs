//! treecopy: recursive file tree copying
//!
//! Every filesystem operation below the two top-level paths is performed
//! relative to an open directory handle (`openat`, `mkdirat`, `fstatat`, ...),
//! so the copy never re-walks a path string from the root. Regular files are
//! streamed in bounded chunks; symlinks, FIFOs and device nodes are recreated.
//!
//! ```rust,no_run
//! use treecopy::{sync::sync_paths, CopyOptions};
//! use std::path::Path;
//!
//! let options = CopyOptions::new().with_force_rewrite(true);
//! sync_paths(Path::new("photos"), Path::new("/backup"), options)?;
//! # Ok::<(), treecopy::SyncError>(())
//! ```

pub mod cli;
pub mod config;
pub mod copy;
pub mod directory;
pub mod error;
pub mod node;
pub mod resolve;
pub mod sync;

// Re-export commonly used types
pub use config::CopyOptions;
pub use directory::{copy_path, CopyStats, TreeCopier};
pub use error::{CopyError, FailureKind, Result, SyncError};
pub use sync::{sync_paths, SyncStats};
