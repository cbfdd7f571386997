//! FIFO and device node creation relative to a directory
//!
//! Nodes are created with `mkfifoat(2)` / `mknodat(2)` and then given their
//! exact permission bits with `fchmodat(2)`, so the result does not depend
//! on the process umask.

use crate::directory::DirectoryFd;
use crate::error::{errno_error, syscall_error, Result};
use crate::metadata::EntryKind;
use crate::sys::display;
use rustix::fs::{chmodat, mkfifoat, mknodat, AtFlags, Mode, RawMode};
use std::ffi::CStr;

fn mode_bits(perms: u32) -> Mode {
    Mode::from_raw_mode((perms & 0o7777) as RawMode)
}

/// Create a named pipe `name` in `dir` with permission bits `perms`
///
/// # Errors
///
/// This function will return an error if:
/// - The name already exists
/// - Permission is denied
/// - `mkfifoat(2)` or the follow-up `fchmodat(2)` fails
pub fn create_fifo_at(dir: &DirectoryFd, name: &CStr, perms: u32) -> Result<()> {
    mkfifoat(dir, name, mode_bits(perms)).map_err(|e| errno_error("mkfifoat", &display(name), e))?;
    set_permissions_at(dir, name, perms)
}

/// Create a block or character device node `name` in `dir`
///
/// # Arguments
///
/// * `dir` - Directory to create the node in
/// * `name` - Name of the node
/// * `kind` - `EntryKind::BlockDevice` or `EntryKind::CharDevice`
/// * `perms` - Permission bits
/// * `device_id` - Device identifier (`st_rdev` of the source node)
///
/// # Errors
///
/// This function will return an error if:
/// - `kind` is not a device kind
/// - The name already exists
/// - The caller lacks `CAP_MKNOD`
/// - `mknodat(2)` or the follow-up `fchmodat(2)` fails
pub fn create_device_at(
    dir: &DirectoryFd,
    name: &CStr,
    kind: EntryKind,
    perms: u32,
    device_id: u64,
) -> Result<()> {
    let Some(file_type) = kind.device_file_type() else {
        return Err(syscall_error(
            "mknodat",
            &display(name),
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{:?} is not a device node type", kind),
            ),
        ));
    };

    mknodat(dir, name, file_type, mode_bits(perms), device_id as rustix::fs::Dev)
        .map_err(|e| errno_error("mknodat", &display(name), e))?;
    set_permissions_at(dir, name, perms)
}

/// Set the permission bits of `name` in `dir`
///
/// # Errors
///
/// Returns an error if `fchmodat(2)` fails.
pub fn set_permissions_at(dir: &DirectoryFd, name: &CStr, perms: u32) -> Result<()> {
    chmodat(dir, name, mode_bits(perms), AtFlags::empty())
        .map_err(|e| errno_error("fchmodat", &display(name), e))
}
