//! Error handling and types
//!
//! Every copy failure is terminal and carries one [`FailureKind`], the path of
//! the offending entry (for diagnostics only) and the underlying error.

use dirfd_fs::{EntryKind, FsError};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Classification of a copy failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// An entry could not be classified
    StatFailure,
    /// A source or destination handle could not be opened
    OpenFailure,
    /// The destination exists with an incompatible type
    TypeConflict,
    /// A FIFO, device, directory could not be created (or an old entry removed)
    NodeCreateFailure,
    /// A symlink target could not be read
    LinkReadFailure,
    /// A symlink could not be recreated
    LinkCreateFailure,
    /// The source yielded fewer bytes than its recorded size
    TruncatedSource,
    /// Writing the destination failed
    WriteFailure,
    /// Closing a destination handle failed after the data was written
    FlushFailure,
    /// The source entry type cannot be copied
    Uncopiable,
}

/// Copy engine errors
#[derive(Error, Debug)]
pub enum CopyError {
    /// Metadata query failed
    #[error("cannot stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    /// Opening a file or directory failed
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    /// Destination type does not match and force-rewrite is off
    #[error("cannot overwrite {} with a {expected}: destination exists with another type", path.display())]
    TypeConflict {
        path: PathBuf,
        /// What the source needs the destination to be
        expected: &'static str,
    },

    /// Destination is the same file as the source it would receive
    #[error("{} and its source are the same file", path.display())]
    SameFile { path: PathBuf },

    /// Node (directory, FIFO, device) creation or replacement failed
    #[error("cannot create {}: {source}", path.display())]
    NodeCreate {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    /// Reading a symlink target failed
    #[error("cannot read symlink {}: {source}", path.display())]
    LinkRead {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    /// Creating a symlink failed
    #[error("cannot create symlink {}: {source}", path.display())]
    LinkCreate {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    /// Source ended (or failed to read) before its recorded size
    #[error("source {} is truncated: expected {expected} bytes, read {copied}", path.display())]
    TruncatedSource {
        path: PathBuf,
        expected: u64,
        copied: u64,
        #[source]
        source: Option<io::Error>,
    },

    /// Writing the destination failed
    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Closing the destination failed
    #[error("error finishing {}: {source}", path.display())]
    Flush {
        path: PathBuf,
        #[source]
        source: FsError,
    },

    /// Source entry is a socket or another unsupported type
    #[error("{} is uncopiable ({kind:?})", path.display())]
    Uncopiable { path: PathBuf, kind: EntryKind },
}

impl CopyError {
    /// Failure classification
    pub fn kind(&self) -> FailureKind {
        match self {
            CopyError::Stat { .. } => FailureKind::StatFailure,
            CopyError::Open { .. } => FailureKind::OpenFailure,
            CopyError::TypeConflict { .. } | CopyError::SameFile { .. } => {
                FailureKind::TypeConflict
            }
            CopyError::NodeCreate { .. } => FailureKind::NodeCreateFailure,
            CopyError::LinkRead { .. } => FailureKind::LinkReadFailure,
            CopyError::LinkCreate { .. } => FailureKind::LinkCreateFailure,
            CopyError::TruncatedSource { .. } => FailureKind::TruncatedSource,
            CopyError::Write { .. } => FailureKind::WriteFailure,
            CopyError::Flush { .. } => FailureKind::FlushFailure,
            CopyError::Uncopiable { .. } => FailureKind::Uncopiable,
        }
    }

    /// Path of the entry the failure refers to
    pub fn path(&self) -> &Path {
        match self {
            CopyError::Stat { path, .. }
            | CopyError::Open { path, .. }
            | CopyError::TypeConflict { path, .. }
            | CopyError::SameFile { path }
            | CopyError::NodeCreate { path, .. }
            | CopyError::LinkRead { path, .. }
            | CopyError::LinkCreate { path, .. }
            | CopyError::TruncatedSource { path, .. }
            | CopyError::Write { path, .. }
            | CopyError::Flush { path, .. }
            | CopyError::Uncopiable { path, .. } => path,
        }
    }

    /// Process exit status for this failure
    ///
    /// Open failures exit with 2 and data transfer failures with 3; every
    /// other failure exits with 1.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            FailureKind::OpenFailure => 2,
            FailureKind::TruncatedSource | FailureKind::WriteFailure => 3,
            _ => 1,
        }
    }
}

/// Result type for copy engine operations
pub type Result<T> = std::result::Result<T, CopyError>;

/// Errors of a whole run: resolving the two paths, then copying
#[derive(Error, Debug)]
pub enum SyncError {
    /// The source/destination pair could not be turned into a copy plan
    #[error(transparent)]
    Resolve(#[from] crate::resolve::ResolveError),

    /// The copy itself failed
    #[error(transparent)]
    Copy(#[from] CopyError),
}

impl SyncError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Resolve(_) => 1,
            SyncError::Copy(e) => e.exit_code(),
        }
    }
}
