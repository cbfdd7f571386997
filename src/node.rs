//! Single-node copy operations
//!
//! Copies one non-directory entry: regular files through the data mover,
//! symlinks by reading and recreating the link text, FIFOs and device nodes
//! by recreating the node. Directories are the tree walker's job.
//!
//! Dispatch goes through a [`ResolvedKind`] computed once per entry. With
//! `follow_symlinks` a link to a regular file resolves to
//! `ResolvedKind::Regular` carrying the referent's size, so both cases share
//! one regular-file path.

use crate::config::CopyOptions;
use crate::copy::{transfer, TransferError};
use crate::error::{CopyError, Result};
use dirfd_fs::{
    close_file, create_device_at, create_fifo_at, create_file_at, create_symlink_at, open_file_at,
    read_link_at, stat_at, stat_fd, truncate_file, DirectoryFd, EntryKind, EntryMetadata,
};
use std::ffi::{CStr, CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Mode of freshly created regular files: owner read and write only
pub const REGULAR_FILE_MODE: u32 = 0o600;

/// One named entry of a source directory
#[derive(Debug, Clone)]
pub struct FilesystemEntry {
    /// Path component inside its parent directory
    pub name: CString,
    /// Metadata from a non-following `fstatat`
    pub metadata: EntryMetadata,
}

impl FilesystemEntry {
    /// Classify `name` inside `dir` without following a final symlink
    ///
    /// # Errors
    ///
    /// Returns `CopyError::Stat` if the metadata query fails.
    pub fn query(dir: &DirectoryFd, name: &CStr) -> Result<Self> {
        let metadata = stat_at(dir, name, false).map_err(|source| CopyError::Stat {
            path: entry_path(dir, name),
            source,
        })?;
        Ok(Self {
            name: name.to_owned(),
            metadata,
        })
    }

    /// Entry type
    pub fn kind(&self) -> EntryKind {
        self.metadata.kind
    }
}

/// How a non-directory entry will be copied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedKind {
    /// Copy bytes; `follow` is set when opening must follow a symlink
    Regular { size: u64, follow: bool },
    /// Recreate a symlink whose target is `target_len` bytes long
    Symlink { target_len: u64 },
    /// Recreate a named pipe
    Fifo { perms: u32 },
    /// Recreate a block or character device
    Device {
        kind: EntryKind,
        perms: u32,
        device_id: u64,
    },
    /// Cannot be copied; `kind` is what was found
    Uncopiable { kind: EntryKind },
}

impl ResolvedKind {
    /// Check whether the destination will be a regular file
    pub fn is_regular(&self) -> bool {
        matches!(self, ResolvedKind::Regular { .. })
    }
}

/// What a successful node copy produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopiedNode {
    /// Regular file with this many bytes
    File { bytes: u64 },
    /// Symbolic link
    Symlink,
    /// FIFO or device node
    Special,
}

/// Decide how `entry` is copied under `options`
///
/// # Errors
///
/// Returns `CopyError::Stat` when `follow_symlinks` is set and the link's
/// referent cannot be queried (a dangling link, for example).
pub fn resolve_kind(
    entry: &FilesystemEntry,
    source_dir: &DirectoryFd,
    options: &CopyOptions,
) -> Result<ResolvedKind> {
    let metadata = &entry.metadata;
    let resolved = match metadata.kind {
        EntryKind::Regular => ResolvedKind::Regular {
            size: metadata.size,
            follow: false,
        },
        EntryKind::Symlink if options.follow_symlinks => {
            let referent = stat_at(source_dir, &entry.name, true).map_err(|source| {
                CopyError::Stat {
                    path: entry_path(source_dir, &entry.name),
                    source,
                }
            })?;
            match referent.kind {
                EntryKind::Regular => ResolvedKind::Regular {
                    size: referent.size,
                    follow: true,
                },
                kind => ResolvedKind::Uncopiable { kind },
            }
        }
        EntryKind::Symlink => ResolvedKind::Symlink {
            target_len: metadata.size,
        },
        EntryKind::Fifo => ResolvedKind::Fifo {
            perms: metadata.permissions(),
        },
        kind @ (EntryKind::BlockDevice | EntryKind::CharDevice) => ResolvedKind::Device {
            kind,
            perms: metadata.permissions(),
            device_id: metadata.device_id,
        },
        kind @ (EntryKind::Directory | EntryKind::Other) => ResolvedKind::Uncopiable { kind },
    };
    Ok(resolved)
}

/// Make `dest_name` ready to receive a non-directory
///
/// A regular destination is kept (and truncated once opened) when the
/// source resolves to a regular file. Any other non-directory is unlinked;
/// a directory is only removed under `force_rewrite`.
///
/// # Errors
///
/// Returns `CopyError::TypeConflict` for a directory without
/// `force_rewrite`, `CopyError::Stat` if the destination cannot be queried
/// and `CopyError::NodeCreate` if removing it fails.
pub fn reconcile_destination(
    dest_dir: &DirectoryFd,
    dest_name: &CStr,
    source_is_regular: bool,
    options: &CopyOptions,
) -> Result<()> {
    let path = entry_path(dest_dir, dest_name);
    let existing = match stat_at(dest_dir, dest_name, false) {
        Ok(metadata) => metadata,
        Err(e) if e.is_not_found() => return Ok(()),
        Err(source) => return Err(CopyError::Stat { path, source }),
    };

    match existing.kind {
        EntryKind::Regular if source_is_regular => Ok(()),
        EntryKind::Directory => {
            if !options.force_rewrite {
                return Err(CopyError::TypeConflict {
                    path,
                    expected: "non-directory",
                });
            }
            warn!("removing directory {} to replace it", path.display());
            dest_dir
                .remove_tree_at(dest_name)
                .map_err(|source| CopyError::NodeCreate { path, source })
        }
        kind => {
            debug!("replacing existing {:?} {}", kind, path.display());
            dest_dir
                .unlink_at(dest_name)
                .map_err(|source| CopyError::NodeCreate { path, source })
        }
    }
}

/// Copy one non-directory entry into `dest_dir` as `dest_name`
///
/// Resolves the entry, reconciles whatever already occupies `dest_name`
/// with [`reconcile_destination`] and then copies with [`copy_resolved`].
/// The tree walker calls this for every non-directory entry.
///
/// # Errors
///
/// An entry that cannot be copied fails with `CopyError::Uncopiable` and
/// creates nothing. Reconciliation failures are described on
/// [`reconcile_destination`], copy failures on [`copy_resolved`].
pub fn copy_entry(
    entry: &FilesystemEntry,
    source_dir: &DirectoryFd,
    dest_dir: &DirectoryFd,
    dest_name: &CStr,
    options: &CopyOptions,
) -> Result<CopiedNode> {
    let resolved = resolve_kind(entry, source_dir, options)?;
    if let ResolvedKind::Uncopiable { kind } = resolved {
        return Err(CopyError::Uncopiable {
            path: entry_path(source_dir, &entry.name),
            kind,
        });
    }
    reconcile_destination(dest_dir, dest_name, resolved.is_regular(), options)?;
    copy_resolved(entry, resolved, source_dir, dest_dir, dest_name)
}

/// Perform the copy for an already resolved entry
///
/// The destination name must be free, or hold a regular file when the
/// entry resolves to a regular file. Nothing is reconciled here.
///
/// # Errors
///
/// | Kind | Failure |
/// |---|---|
/// | Regular | `Open`, `Stat`, `SameFile`, `TruncatedSource`, `Write`, `Flush` |
/// | Symlink | `LinkRead`, `LinkCreate` |
/// | FIFO / device | `NodeCreate` |
/// | anything else | `Uncopiable` |
pub fn copy_resolved(
    entry: &FilesystemEntry,
    resolved: ResolvedKind,
    source_dir: &DirectoryFd,
    dest_dir: &DirectoryFd,
    dest_name: &CStr,
) -> Result<CopiedNode> {
    match resolved {
        ResolvedKind::Regular { size, follow } => {
            copy_regular(source_dir, &entry.name, dest_dir, dest_name, size, follow)
                .map(|bytes| CopiedNode::File { bytes })
        }
        ResolvedKind::Symlink { target_len } => {
            copy_symlink(source_dir, &entry.name, dest_dir, dest_name, target_len)?;
            Ok(CopiedNode::Symlink)
        }
        ResolvedKind::Fifo { perms } => {
            create_fifo_at(dest_dir, dest_name, perms).map_err(|source| {
                CopyError::NodeCreate {
                    path: entry_path(dest_dir, dest_name),
                    source,
                }
            })?;
            debug!("created fifo {}", entry_path(dest_dir, dest_name).display());
            Ok(CopiedNode::Special)
        }
        ResolvedKind::Device {
            kind,
            perms,
            device_id,
        } => {
            create_device_at(dest_dir, dest_name, kind, perms, device_id).map_err(|source| {
                CopyError::NodeCreate {
                    path: entry_path(dest_dir, dest_name),
                    source,
                }
            })?;
            debug!(
                "created {:?} node {} ({:#x})",
                kind,
                entry_path(dest_dir, dest_name).display(),
                device_id
            );
            Ok(CopiedNode::Special)
        }
        ResolvedKind::Uncopiable { kind } => Err(CopyError::Uncopiable {
            path: entry_path(source_dir, &entry.name),
            kind,
        }),
    }
}

/// Copy a regular file's bytes; returns the number of bytes copied
///
/// The destination is opened without truncation and compared with the
/// source by device and inode first. A followed link whose referent is the
/// destination itself would otherwise be emptied before it is read.
fn copy_regular(
    source_dir: &DirectoryFd,
    source_name: &CStr,
    dest_dir: &DirectoryFd,
    dest_name: &CStr,
    size: u64,
    follow: bool,
) -> Result<u64> {
    let mut source = open_file_at(source_dir, source_name, follow).map_err(|source| {
        CopyError::Open {
            path: entry_path(source_dir, source_name),
            source,
        }
    })?;
    let mut dest = create_file_at(dest_dir, dest_name, REGULAR_FILE_MODE).map_err(|source| {
        CopyError::Open {
            path: entry_path(dest_dir, dest_name),
            source,
        }
    })?;

    let source_meta = stat_fd(&source, source_name).map_err(|source| CopyError::Stat {
        path: entry_path(source_dir, source_name),
        source,
    })?;
    let dest_meta = stat_fd(&dest, dest_name).map_err(|source| CopyError::Stat {
        path: entry_path(dest_dir, dest_name),
        source,
    })?;
    if source_meta.same_inode(&dest_meta) {
        return Err(CopyError::SameFile {
            path: entry_path(dest_dir, dest_name),
        });
    }
    truncate_file(&dest, dest_name).map_err(|source| CopyError::Open {
        path: entry_path(dest_dir, dest_name),
        source,
    })?;

    let moved = transfer(&mut source, &mut dest, size).map_err(|e| match e {
        TransferError::Truncated {
            expected,
            copied,
            source,
        } => CopyError::TruncatedSource {
            path: entry_path(source_dir, source_name),
            expected,
            copied,
            source,
        },
        TransferError::Write { source, .. } => CopyError::Write {
            path: entry_path(dest_dir, dest_name),
            source,
        },
    })?;
    drop(source);

    close_file(dest, dest_name).map_err(|source| CopyError::Flush {
        path: entry_path(dest_dir, dest_name),
        source,
    })?;

    debug!(
        "copied {} -> {} ({} bytes)",
        entry_path(source_dir, source_name).display(),
        entry_path(dest_dir, dest_name).display(),
        moved
    );
    Ok(moved)
}

/// Recreate a symlink with the same target text
fn copy_symlink(
    source_dir: &DirectoryFd,
    source_name: &CStr,
    dest_dir: &DirectoryFd,
    dest_name: &CStr,
    target_len: u64,
) -> Result<()> {
    let target = read_link_at(source_dir, source_name, target_len).map_err(|source| {
        CopyError::LinkRead {
            path: entry_path(source_dir, source_name),
            source,
        }
    })?;
    create_symlink_at(dest_dir, &target, dest_name).map_err(|source| CopyError::LinkCreate {
        path: entry_path(dest_dir, dest_name),
        source,
    })?;

    debug!(
        "copied symlink {} -> {}",
        entry_path(dest_dir, dest_name).display(),
        target.to_string_lossy()
    );
    Ok(())
}

/// Display path of `name` inside `dir`, for diagnostics
pub(crate) fn entry_path(dir: &DirectoryFd, name: &CStr) -> PathBuf {
    dir.path().join(OsStr::from_bytes(name.to_bytes()))
}
