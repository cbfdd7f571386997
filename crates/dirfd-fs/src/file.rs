//! Regular file handles opened relative to a directory

use crate::directory::DirectoryFd;
use crate::error::{errno_error, Result};
use crate::sys::{close_fd, display};
use rustix::fs::{ftruncate, openat, Mode, OFlags, RawMode};
use std::ffi::CStr;
use std::fs::File;
use std::os::unix::io::IntoRawFd;

/// Open `name` in `dir` for reading
///
/// With `follow` unset the call fails with `ELOOP` on a symlink.
///
/// # Errors
///
/// Returns an error if `openat(2)` fails.
pub fn open_file_at(dir: &DirectoryFd, name: &CStr, follow: bool) -> Result<File> {
    let mut flags = OFlags::RDONLY | OFlags::CLOEXEC;
    if !follow {
        flags |= OFlags::NOFOLLOW;
    }
    let fd = openat(dir, name, flags, Mode::empty())
        .map_err(|e| errno_error("openat", &display(name), e))?;
    Ok(File::from(fd))
}

/// Open `name` in `dir` for writing, creating it if missing
///
/// Opened with `O_WRONLY | O_CREAT | O_NOFOLLOW`, so an existing symlink at
/// `name` is never written through. Existing content is kept; call
/// [`truncate_file`] once the file is known to be safe to overwrite.
///
/// # Errors
///
/// Returns an error if `openat(2)` fails; `EISDIR` when `name` is a
/// directory, `ELOOP` when it is a symlink.
pub fn create_file_at(dir: &DirectoryFd, name: &CStr, mode: u32) -> Result<File> {
    let flags = OFlags::WRONLY | OFlags::CREATE | OFlags::NOFOLLOW | OFlags::CLOEXEC;
    let fd = openat(dir, name, flags, Mode::from_raw_mode(mode as RawMode))
        .map_err(|e| errno_error("openat", &display(name), e))?;
    Ok(File::from(fd))
}

/// Discard the content of an open file
///
/// # Errors
///
/// Returns an error if `ftruncate(2)` fails.
pub fn truncate_file(file: &File, name: &CStr) -> Result<()> {
    ftruncate(file, 0).map_err(|e| errno_error("ftruncate", &display(name), e))
}

/// Close a file, reporting the result of `close(2)`
///
/// Dropping a `File` discards close errors; written data that fails to flush
/// at close time is only visible this way.
///
/// # Errors
///
/// Returns an error if `close(2)` fails.
pub fn close_file(file: File, name: &CStr) -> Result<()> {
    close_fd(file.into_raw_fd(), &display(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::fs;
    use std::io::{Read, Write};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[test]
    fn test_create_write_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DirectoryFd::open(temp_dir.path()).unwrap();
        let name = CString::new("out.txt").unwrap();

        let mut file = create_file_at(&dir, &name, 0o600).unwrap();
        file.write_all(b"payload").unwrap();
        close_file(file, &name).unwrap();

        let mode = fs::metadata(temp_dir.path().join("out.txt")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let mut contents = String::new();
        open_file_at(&dir, &name, false)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "payload");
    }

    #[test]
    fn test_create_keeps_content_until_truncated() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("f"), b"a much longer old content").unwrap();
        let dir = DirectoryFd::open(temp_dir.path()).unwrap();
        let name = CString::new("f").unwrap();

        let mut file = create_file_at(&dir, &name, 0o600).unwrap();
        assert_eq!(fs::read(temp_dir.path().join("f")).unwrap().len(), 25);
        truncate_file(&file, &name).unwrap();
        file.write_all(b"new").unwrap();
        close_file(file, &name).unwrap();

        assert_eq!(fs::read(temp_dir.path().join("f")).unwrap(), b"new");
    }

    #[test]
    fn test_create_does_not_follow_symlink() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("target"), b"keep").unwrap();
        std::os::unix::fs::symlink("target", temp_dir.path().join("link")).unwrap();
        let dir = DirectoryFd::open(temp_dir.path()).unwrap();

        let err = create_file_at(&dir, &CString::new("link").unwrap(), 0o600).unwrap_err();
        assert!(err.is_not_directory());
        assert_eq!(fs::read(temp_dir.path().join("target")).unwrap(), b"keep");
    }

    #[test]
    fn test_open_follow_flag() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("target"), b"x").unwrap();
        std::os::unix::fs::symlink("target", temp_dir.path().join("link")).unwrap();
        let dir = DirectoryFd::open(temp_dir.path()).unwrap();
        let link = CString::new("link").unwrap();

        assert!(open_file_at(&dir, &link, false).is_err());
        assert!(open_file_at(&dir, &link, true).is_ok());
    }
}
