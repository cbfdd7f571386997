//! # dirfd-fs
//!
//! Directory-relative filesystem operations for Unix:
//! - `DirectoryFd`, an owned directory descriptor that every other operation
//!   is addressed through
//! - `fstatat` metadata queries that do not follow the final symlink
//! - file, directory, symlink, FIFO and device node creation with the `*at`
//!   family of system calls
//! - directory enumeration on a duplicated descriptor
//!
//! Working relative to an open directory instead of rebuilding path strings
//! avoids re-resolving intermediate components (TOCTOU) and keeps deep trees
//! below `PATH_MAX`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dirfd_fs::{stat_at, DirectoryFd};
//! use std::path::Path;
//!
//! # fn example() -> dirfd_fs::Result<()> {
//! let dir = DirectoryFd::open(Path::new("/etc"))?;
//! for name in dir.entries()? {
//!     let name = name?;
//!     let metadata = stat_at(&dir, &name, false)?;
//!     println!("{:?} is {:?}", name, metadata.kind);
//! }
//! dir.close()?;
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod directory;
pub mod error;
pub mod file;
pub mod metadata;
pub mod symlink;

mod sys;

// Re-export main types
pub use directory::{is_dot_or_dotdot, DirEntries, DirectoryFd};
pub use error::{FsError, Result};
pub use metadata::{stat_at, stat_fd, EntryKind, EntryMetadata};

// Re-export specific operations
pub use device::{create_device_at, create_fifo_at, set_permissions_at};
pub use file::{close_file, create_file_at, open_file_at, truncate_file};
pub use symlink::{create_symlink_at, read_link_at};
