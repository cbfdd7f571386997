//! Small helpers shared by the system call wrappers

use crate::error::{syscall_error, Result};
use std::ffi::CStr;
use std::os::unix::io::RawFd;

/// Close `fd`, reporting the result of `close(2)`
///
/// `OwnedFd` and `File` discard close errors on drop.
pub(crate) fn close_fd(fd: RawFd, name: &str) -> Result<()> {
    // SAFETY: the caller gives up ownership of fd, which is closed exactly once here
    if unsafe { libc::close(fd) } == -1 {
        return Err(syscall_error("close", name, std::io::Error::last_os_error()));
    }
    Ok(())
}

/// Lossy rendering of an entry name for error messages
pub(crate) fn display(name: &CStr) -> String {
    name.to_string_lossy().into_owned()
}
