//! Error types for dirfd-fs operations

use rustix::io::Errno;
use std::io;
use thiserror::Error;

/// Result type for dirfd-fs operations
pub type Result<T> = std::result::Result<T, FsError>;

/// Errors raised by directory-relative filesystem operations
#[derive(Error, Debug)]
pub enum FsError {
    /// A system call failed
    #[error("{op} failed for '{name}': {source}")]
    Syscall {
        /// Name of the failing system call
        op: &'static str,
        /// Entry (or path) the call was addressed to
        name: String,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// `readlinkat` returned a target whose length differs from `st_size`
    #[error("symlink '{name}' target is {actual} bytes, expected {expected}")]
    LinkLength {
        /// Name of the symbolic link
        name: String,
        /// Length recorded by `fstatat`
        expected: u64,
        /// Length returned by `readlinkat`
        actual: u64,
    },
}

impl FsError {
    /// Raw OS error number, when the failure came from a system call
    pub fn errno(&self) -> Option<i32> {
        match self {
            FsError::Syscall { source, .. } => source.raw_os_error(),
            FsError::LinkLength { .. } => None,
        }
    }

    fn os_errno(&self) -> Option<Errno> {
        match self {
            FsError::Syscall { source, .. } => Errno::from_io_error(source),
            FsError::LinkLength { .. } => None,
        }
    }

    /// Check if the failing entry does not exist
    pub fn is_not_found(&self) -> bool {
        self.os_errno() == Some(Errno::NOENT)
    }

    /// Check if the failure is `ENOTDIR` or `ELOOP`: the name exists but is
    /// not a directory that can be opened without following a symlink
    pub fn is_not_directory(&self) -> bool {
        matches!(self.os_errno(), Some(Errno::NOTDIR) | Some(Errno::LOOP))
    }

    /// `std::io::ErrorKind` of the underlying error
    pub fn io_kind(&self) -> io::ErrorKind {
        match self {
            FsError::Syscall { source, .. } => source.kind(),
            FsError::LinkLength { .. } => io::ErrorKind::UnexpectedEof,
        }
    }
}

/// Build a `Syscall` error from an existing `io::Error`
pub(crate) fn syscall_error(op: &'static str, name: &str, source: io::Error) -> FsError {
    FsError::Syscall {
        op,
        name: name.to_string(),
        source,
    }
}

/// Build a `Syscall` error from a `rustix` errno
pub(crate) fn errno_error(op: &'static str, name: &str, errno: Errno) -> FsError {
    syscall_error(op, name, io::Error::from(errno))
}
