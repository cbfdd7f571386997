//! Entry classification with `fstatat(2)`
//!
//! Queries are addressed by (directory descriptor, name) and, by default, do
//! not follow a final symlink, so a link is classified as a link and not as
//! whatever it points to.

use crate::directory::DirectoryFd;
use crate::error::{errno_error, Result};
use crate::sys::display;
use rustix::fs::{fstat, statat, AtFlags, FileType, RawMode, Stat};
use std::ffi::CStr;
use std::os::unix::io::AsFd;

/// Type of a filesystem entry, from the `S_IFMT` bits of its mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    Regular,
    /// Symbolic link
    Symlink,
    /// Named pipe
    Fifo,
    /// Block device node
    BlockDevice,
    /// Character device node
    CharDevice,
    /// Directory
    Directory,
    /// Socket or an unknown type
    Other,
}

impl EntryKind {
    /// Classify a raw `st_mode` value
    pub fn from_mode(mode: u32) -> Self {
        match FileType::from_raw_mode(mode as RawMode) {
            FileType::RegularFile => EntryKind::Regular,
            FileType::Symlink => EntryKind::Symlink,
            FileType::Fifo => EntryKind::Fifo,
            FileType::BlockDevice => EntryKind::BlockDevice,
            FileType::CharacterDevice => EntryKind::CharDevice,
            FileType::Directory => EntryKind::Directory,
            _ => EntryKind::Other,
        }
    }

    /// Node type for `mknodat(2)`, for device kinds only
    pub fn device_file_type(self) -> Option<FileType> {
        match self {
            EntryKind::BlockDevice => Some(FileType::BlockDevice),
            EntryKind::CharDevice => Some(FileType::CharacterDevice),
            _ => None,
        }
    }
}

/// Metadata of one entry as reported by `fstatat(2)` or `fstat(2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Entry type
    pub kind: EntryKind,
    /// Byte length; meaningful for regular files and symlinks only
    pub size: u64,
    /// Full `st_mode`: type and permission bits
    pub mode: u32,
    /// Device identifier of a device node (`st_rdev`)
    pub device_id: u64,
    /// Device of the filesystem holding the entry (`st_dev`)
    pub dev: u64,
    /// Inode number
    pub ino: u64,
}

impl EntryMetadata {
    /// Permission bits, including setuid, setgid and sticky
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    /// Check whether both describe the same inode
    pub fn same_inode(&self, other: &EntryMetadata) -> bool {
        self.dev == other.dev && self.ino == other.ino
    }

    #[allow(clippy::unnecessary_cast)]
    fn from_stat(st: &Stat) -> Self {
        let mode = st.st_mode as u32;
        Self {
            kind: EntryKind::from_mode(mode),
            size: st.st_size.max(0) as u64,
            mode,
            device_id: st.st_rdev as u64,
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
        }
    }
}

/// Query the metadata of `name` relative to `dir`
///
/// # Arguments
///
/// * `dir` - Directory the name is resolved in
/// * `name` - Single path component
/// * `follow` - Follow a final symlink (`false` classifies the link itself)
///
/// # Errors
///
/// Returns an error if `fstatat(2)` fails, for example when the name does not
/// exist or, with `follow`, the link is dangling.
pub fn stat_at(dir: &DirectoryFd, name: &CStr, follow: bool) -> Result<EntryMetadata> {
    let flags = if follow {
        AtFlags::empty()
    } else {
        AtFlags::SYMLINK_NOFOLLOW
    };
    let st = statat(dir, name, flags).map_err(|e| errno_error("fstatat", &display(name), e))?;
    Ok(EntryMetadata::from_stat(&st))
}

/// Query the metadata of an open descriptor; `name` is for error messages
///
/// # Errors
///
/// Returns an error if `fstat(2)` fails.
pub fn stat_fd<Fd: AsFd>(fd: Fd, name: &CStr) -> Result<EntryMetadata> {
    let st = fstat(fd).map_err(|e| errno_error("fstat", &display(name), e))?;
    Ok(EntryMetadata::from_stat(&st))
}
