//! Bulk data transfer between two open file handles
//!
//! The data mover copies exactly `byte_count` bytes from a reader positioned
//! at the start of the data to a writer positioned at the start of a freshly
//! truncated destination. It works through a single buffer of at most
//! [`CHUNK_SIZE`] bytes, so peak memory use does not depend on file size.
//!
//! # Failure rules
//!
//! - Every chunk read must fill the chunk. End of file or a read error
//!   before `byte_count` bytes is [`TransferError::Truncated`]: the source
//!   shrank, or is not a fully readable regular stream.
//! - Partial writes are accumulated until the chunk is written. A write
//!   error, or a write that accepts zero bytes, is [`TransferError::Write`].
//! - `EINTR` is retried on both sides; nothing else is.
//!
//! # Usage
//!
//! ```rust
//! use treecopy::copy::transfer;
//! use std::io::Cursor;
//!
//! let mut source = Cursor::new(b"hello world".to_vec());
//! let mut dest = Vec::new();
//! let moved = transfer(&mut source, &mut dest, 11).unwrap();
//! assert_eq!(moved, 11);
//! assert_eq!(dest, b"hello world");
//! ```

use std::io::{self, Read, Write};
use thiserror::Error;

/// Transfer chunk size (1 MiB)
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Failure of a single transfer
#[derive(Error, Debug)]
pub enum TransferError {
    /// The source ran out (or failed) before `expected` bytes were read
    #[error("source truncated: expected {expected} bytes, got {copied}")]
    Truncated {
        /// Bytes the caller asked for
        expected: u64,
        /// Bytes read successfully before the failure
        copied: u64,
        /// Read error, if the source failed rather than ended
        #[source]
        source: Option<io::Error>,
    },

    /// Writing the destination failed
    #[error("write failed after {copied} bytes: {source}")]
    Write {
        /// Bytes fully written before the failure
        copied: u64,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Copy exactly `byte_count` bytes from `source` to `dest`
///
/// # Parameters
///
/// * `source` - Handle open for reading at the intended start offset
/// * `dest` - Handle open for writing at the intended start offset
/// * `byte_count` - Number of bytes to move
///
/// # Returns
///
/// The number of bytes moved, which is always `byte_count` on success.
///
/// # Errors
///
/// Returns [`TransferError::Truncated`] when the source cannot supply
/// `byte_count` bytes and [`TransferError::Write`] when the destination
/// rejects a write. After an error both offsets are wherever the failing call
/// left them; do not call again without repositioning.
pub fn transfer<R, W>(source: &mut R, dest: &mut W, byte_count: u64) -> Result<u64, TransferError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    if byte_count == 0 {
        return Ok(0);
    }

    let buffer_len = usize::try_from(byte_count).map_or(CHUNK_SIZE, |n| n.min(CHUNK_SIZE));
    let mut buffer = vec![0u8; buffer_len];
    let mut copied = 0u64;

    while copied < byte_count {
        let remaining = byte_count - copied;
        let chunk = usize::try_from(remaining).map_or(buffer_len, |n| n.min(buffer_len));
        let chunk_buf = &mut buffer[..chunk];

        read_chunk(source, chunk_buf).map_err(|(read, error)| TransferError::Truncated {
            expected: byte_count,
            copied: copied + read as u64,
            source: error,
        })?;

        write_chunk(dest, chunk_buf).map_err(|source| TransferError::Write { copied, source })?;

        copied += chunk as u64;
        tracing::trace!("transfer: {} of {} bytes", copied, byte_count);
    }

    Ok(copied)
}

/// Fill `buf` completely from `source`
///
/// On failure returns how many bytes of the chunk were read and the read
/// error, or `None` when the source simply ended.
fn read_chunk<R: Read + ?Sized>(
    source: &mut R,
    buf: &mut [u8],
) -> Result<(), (usize, Option<io::Error>)> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => return Err((filled, None)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err((filled, Some(e))),
        }
    }
    Ok(())
}

/// Write all of `buf`, accumulating partial writes
fn write_chunk<W: Write + ?Sized>(dest: &mut W, buf: &[u8]) -> io::Result<()> {
    let mut written = 0;
    while written < buf.len() {
        match dest.write(&buf[written..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "destination accepted no bytes",
                ))
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
