//! Symlink operations for reading and creating symbolic links

use crate::directory::DirectoryFd;
use crate::error::{errno_error, FsError, Result};
use crate::sys::display;
use rustix::fs::{readlinkat, symlinkat};
use std::ffi::{CStr, CString};

/// Read the target of the symlink `name` in `dir`
///
/// `expected_len` is the link's `st_size`. A target whose length changed
/// since the `fstatat(2)` is reported instead of being used.
///
/// # Errors
///
/// This function will return an error if:
/// - `name` is not a symbolic link
/// - `readlinkat(2)` fails
/// - The target length differs from `expected_len`
pub fn read_link_at(dir: &DirectoryFd, name: &CStr, expected_len: u64) -> Result<CString> {
    let capacity = usize::try_from(expected_len)
        .unwrap_or(0)
        .saturating_add(1);
    let target = readlinkat(dir, name, Vec::with_capacity(capacity))
        .map_err(|e| errno_error("readlinkat", &display(name), e))?;

    let actual = target.as_bytes().len() as u64;
    if actual != expected_len {
        return Err(FsError::LinkLength {
            name: display(name),
            expected: expected_len,
            actual,
        });
    }
    Ok(target)
}

/// Create the symlink `link_name` in `dir` pointing at `target`
///
/// The target string is stored byte for byte; it does not need to exist.
///
/// # Errors
///
/// Returns an error if `symlinkat(2)` fails, for example `EEXIST`.
pub fn create_symlink_at(dir: &DirectoryFd, target: &CStr, link_name: &CStr) -> Result<()> {
    symlinkat(target, dir, link_name)
        .map_err(|e| errno_error("symlinkat", &display(link_name), e))?;
    log::trace!(
        "created symlink {} -> {}",
        dir.path().join(display(link_name)).display(),
        target.to_string_lossy()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::stat_at;
    use rustix::io::Errno;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_symlink_round_trip_dangling_target() {
        let temp_dir = TempDir::new().unwrap();
        let dir = DirectoryFd::open(temp_dir.path()).unwrap();
        let target = CString::new("/does/not/exist").unwrap();
        let link = CString::new("link").unwrap();

        create_symlink_at(&dir, &target, &link).unwrap();
        assert_eq!(
            fs::read_link(temp_dir.path().join("link")).unwrap(),
            PathBuf::from("/does/not/exist")
        );

        let metadata = stat_at(&dir, &link, false).unwrap();
        let read = read_link_at(&dir, &link, metadata.size).unwrap();
        assert_eq!(read, target);
    }

    #[test]
    fn test_read_link_length_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink("abcdef", temp_dir.path().join("link")).unwrap();
        let dir = DirectoryFd::open(temp_dir.path()).unwrap();
        let link = CString::new("link").unwrap();

        let err = read_link_at(&dir, &link, 3).unwrap_err();
        assert!(matches!(
            err,
            FsError::LinkLength {
                expected: 3,
                actual: 6,
                ..
            }
        ));

        let err = read_link_at(&dir, &link, 10).unwrap_err();
        assert!(matches!(
            err,
            FsError::LinkLength {
                expected: 10,
                actual: 6,
                ..
            }
        ));
    }

    #[test]
    fn test_create_symlink_existing_name() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("taken"), b"").unwrap();
        let dir = DirectoryFd::open(temp_dir.path()).unwrap();

        let err = create_symlink_at(
            &dir,
            &CString::new("x").unwrap(),
            &CString::new("taken").unwrap(),
        )
        .unwrap_err();
        assert_eq!(err.errno(), Some(Errno::EXIST.raw_os_error()));
    }

    #[test]
    fn test_read_link_on_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("plain"), b"abc").unwrap();
        let dir = DirectoryFd::open(temp_dir.path()).unwrap();

        let err = read_link_at(&dir, &CString::new("plain").unwrap(), 3).unwrap_err();
        assert_eq!(err.errno(), Some(Errno::INVAL.raw_os_error()));
    }
}
