//! Directory file descriptor for directory-relative operations
//!
//! `DirectoryFd` owns an open directory. Children are looked up, opened,
//! created and removed through it with the `*at` system calls, so a deep tree
//! is walked by carrying descriptors down the stack instead of path strings.

use crate::error::{errno_error, Result};
use crate::metadata::{stat_at, EntryKind};
use crate::sys::{close_fd, display};
use rustix::fs::{mkdirat, open, openat, unlinkat, AtFlags, Dir, Mode, OFlags, RawMode};
use std::ffi::{CStr, CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

/// A directory file descriptor
///
/// The descriptor is opened with `O_DIRECTORY | O_CLOEXEC` and released when
/// the value is dropped. Use [`DirectoryFd::close`] instead of dropping when
/// the result of `close(2)` matters.
///
/// # Example
///
/// ```rust,no_run
/// use dirfd_fs::DirectoryFd;
/// use std::ffi::CString;
/// use std::path::Path;
///
/// # fn example() -> dirfd_fs::Result<()> {
/// let dir = DirectoryFd::open(Path::new("/tmp"))?;
/// let name = CString::new("new_dir").unwrap();
/// dir.create_dir_at(&name, 0o700)?;
/// let child = dir.open_dir_at(&name)?;
/// child.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DirectoryFd {
    /// The underlying file descriptor
    fd: OwnedFd,
    /// The path this directory represents (for debugging/error messages)
    path: PathBuf,
}

impl DirectoryFd {
    /// Open a directory by path
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - The path doesn't exist
    /// - The path is not a directory
    /// - Permission is denied
    pub fn open(path: &Path) -> Result<Self> {
        let fd = open(
            path,
            OFlags::RDONLY | OFlags::DIRECTORY | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(|e| errno_error("open", &path.to_string_lossy(), e))?;
        log::trace!("opened directory {} as fd {}", path.display(), fd.as_raw_fd());

        Ok(Self {
            fd,
            path: path.to_path_buf(),
        })
    }

    /// Open the child directory `name` without following a final symlink
    ///
    /// A child that exists but is not a directory (a symlink included) fails
    /// with `ENOTDIR` or `ELOOP`; see [`crate::FsError::is_not_directory`].
    ///
    /// # Errors
    ///
    /// Returns an error if `openat(2)` fails.
    pub fn open_dir_at(&self, name: &CStr) -> Result<Self> {
        let fd = openat(
            &self.fd,
            name,
            OFlags::RDONLY | OFlags::DIRECTORY | OFlags::NOFOLLOW | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(|e| errno_error("openat", &display(name), e))?;
        let path = self.path.join(OsStr::from_bytes(name.to_bytes()));
        log::trace!("opened directory {} as fd {}", path.display(), fd.as_raw_fd());

        Ok(Self { fd, path })
    }

    /// Create the child directory `name` with the given permission bits
    ///
    /// The process umask still applies, as with `mkdir(2)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name already exists, permission is denied, or
    /// `mkdirat(2)` otherwise fails.
    pub fn create_dir_at(&self, name: &CStr, mode: u32) -> Result<()> {
        mkdirat(&self.fd, name, Mode::from_raw_mode(mode as RawMode))
            .map_err(|e| errno_error("mkdirat", &display(name), e))
    }

    /// Remove the non-directory child `name`
    ///
    /// # Errors
    ///
    /// Returns an error if `unlinkat(2)` fails (for example `EISDIR`).
    pub fn unlink_at(&self, name: &CStr) -> Result<()> {
        unlinkat(&self.fd, name, AtFlags::empty())
            .map_err(|e| errno_error("unlinkat", &display(name), e))
    }

    /// Remove the child `name` whatever its type, descending into directories
    ///
    /// Directories are emptied through their own descriptors, never through
    /// path strings, and symlinks are removed rather than followed.
    ///
    /// # Errors
    ///
    /// Returns the first error met while removing the subtree.
    pub fn remove_tree_at(&self, name: &CStr) -> Result<()> {
        let metadata = stat_at(self, name, false)?;
        if metadata.kind != EntryKind::Directory {
            return self.unlink_at(name);
        }

        let child = self.open_dir_at(name)?;
        let names = child.entries()?.collect::<Result<Vec<CString>>>()?;
        for entry in names.iter().filter(|n| !is_dot_or_dotdot(n)) {
            child.remove_tree_at(entry)?;
        }
        child.close()?;

        unlinkat(&self.fd, name, AtFlags::REMOVEDIR)
            .map_err(|e| errno_error("unlinkat", &display(name), e))?;
        log::trace!("removed directory tree {}", self.path.join(display(name)).display());
        Ok(())
    }

    /// Enumerate the names in this directory, `.` and `..` included
    ///
    /// The stream reads from its own descriptor for this directory, so this
    /// `DirectoryFd` stays usable for `*at` calls while iterating and every
    /// enumeration starts from the top.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory stream cannot be opened.
    pub fn entries(&self) -> Result<DirEntries> {
        let dir = Dir::read_from(&self.fd)
            .map_err(|e| errno_error("opendir", &self.path.to_string_lossy(), e))?;
        Ok(DirEntries {
            dir,
            path: self.path.clone(),
            done: false,
        })
    }

    /// Close the descriptor, reporting the result of `close(2)`
    ///
    /// # Errors
    ///
    /// Returns an error if `close(2)` fails. The descriptor is released
    /// either way.
    pub fn close(self) -> Result<()> {
        close_fd(self.fd.into_raw_fd(), &self.path.to_string_lossy())
    }

    /// Get the path this directory represents
    ///
    /// This is used for error messages and debugging only; operations never
    /// re-resolve it.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRawFd for DirectoryFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for DirectoryFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// Iterator over the names of a directory
///
/// Yields `Err` once if reading the stream fails, then stops.
#[derive(Debug)]
pub struct DirEntries {
    dir: Dir,
    path: PathBuf,
    done: bool,
}

impl Iterator for DirEntries {
    type Item = Result<CString>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.dir.read() {
            Some(Ok(entry)) => Some(Ok(entry.file_name().to_owned())),
            Some(Err(e)) => {
                self.done = true;
                Some(Err(errno_error("readdir", &self.path.to_string_lossy(), e)))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}

/// Check whether `name` is the `.` or `..` entry
pub fn is_dot_or_dotdot(name: &CStr) -> bool {
    matches!(name.to_bytes(), b"." | b"..")
}
