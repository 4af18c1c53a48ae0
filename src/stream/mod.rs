//! Seekable byte streams
//!
//! Disc images are read through a stack of small stream types that all
//! implement [`ByteStream`]: a raw source ([`FileStream`], [`MemoryStream`]),
//! a cursor over a source shared between readers ([`SharedStream`]), a view
//! that strips per-block padding from raw CD sectors ([`BlockPaddedStream`])
//! and a view restricted to a byte range ([`SubRangeStream`]).

mod file;
mod memory;
mod padded;
mod range;
mod shared;

pub use file::FileStream;
pub use memory::MemoryStream;
pub use padded::{BlockLayout, BlockPaddedStream};
pub use range::SubRangeStream;
pub use shared::{share, SharedSource, SharedStream};

use std::fmt;
use std::io::{self, SeekFrom};
use thiserror::Error;

/// Errors that can occur when accessing a byte stream
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Stream is closed")]
    Closed,

    #[error("Cannot seek to negative offset {0}")]
    NegativeOffset(i128),

    #[error("Offset is out of range")]
    OffsetOverflow,

    #[error("Stream is read-only")]
    ReadOnly,
}

/// A read or write that failed after transferring `bytes` bytes.
///
/// The stream offset has already been advanced by `bytes` when this is returned.
#[derive(Error, Debug)]
#[error("{source} (after {bytes} bytes)")]
pub struct PartialTransfer {
    pub bytes: usize,
    #[source]
    pub source: StreamError,
}

impl PartialTransfer {
    pub fn new(bytes: usize, source: impl Into<StreamError>) -> Self {
        Self {
            bytes,
            source: source.into(),
        }
    }
}

pub type StreamResult<T> = Result<T, StreamError>;

/// Result of a read or write: the number of bytes transferred.
pub type TransferResult = Result<usize, PartialTransfer>;

/// A random-access byte stream with its own offset.
///
/// Seeking past the end of the stream is legal; reads from there return zero
/// bytes. Once closed, every operation except [`ByteStream::offset`] fails
/// with [`StreamError::Closed`].
pub trait ByteStream: Send {
    /// Current byte offset
    fn offset(&self) -> u64;

    /// Length of the stream, i.e. the maximum addressable offset
    fn max_offset(&self) -> StreamResult<u64>;

    /// Whether the offset is at or beyond the end of the stream
    fn is_at_end(&self) -> StreamResult<bool> {
        Ok(self.offset() >= self.max_offset()?)
    }

    /// Move the offset, returning the new offset.
    /// A seek to a negative offset fails and leaves the offset unchanged.
    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64>;

    /// Read at most `buf.len()` bytes from the current offset.
    /// Fewer bytes than requested signals the end of the stream.
    fn read(&mut self, buf: &mut [u8]) -> TransferResult;

    /// Write `buf` at the current offset.
    fn write(&mut self, _buf: &[u8]) -> TransferResult {
        if self.is_closed() {
            return Err(PartialTransfer::new(0, StreamError::Closed));
        }
        Err(PartialTransfer::new(0, StreamError::ReadOnly))
    }

    fn is_writable(&self) -> bool {
        false
    }

    /// Release the stream. Further operations fail.
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    /// Read until `buf` is full or the end of the stream is reached.
    fn read_fully(&mut self, buf: &mut [u8]) -> TransferResult {
        let mut total = 0;
        while total < buf.len() {
            match self.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) => return Err(PartialTransfer::new(total + e.bytes, e.source)),
            }
        }
        Ok(total)
    }

    /// Write all of `buf`, stopping at the first failure.
    fn write_all(&mut self, buf: &[u8]) -> TransferResult {
        let mut total = 0;
        while total < buf.len() {
            match self.write(&buf[total..]) {
                Ok(0) => {
                    return Err(PartialTransfer::new(
                        total,
                        io::Error::from(io::ErrorKind::WriteZero),
                    ))
                }
                Ok(n) => total += n,
                Err(e) => return Err(PartialTransfer::new(total + e.bytes, e.source)),
            }
        }
        Ok(total)
    }
}

impl<S: ByteStream + ?Sized> ByteStream for Box<S> {
    fn offset(&self) -> u64 {
        (**self).offset()
    }

    fn max_offset(&self) -> StreamResult<u64> {
        (**self).max_offset()
    }

    fn is_at_end(&self) -> StreamResult<bool> {
        (**self).is_at_end()
    }

    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        (**self).seek(pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> TransferResult {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> TransferResult {
        (**self).write(buf)
    }

    fn is_writable(&self) -> bool {
        (**self).is_writable()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

impl fmt::Debug for dyn ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("offset", &self.offset())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Compute the target of a seek. `max_offset` is only queried for
/// [`SeekFrom::End`].
pub(crate) fn resolve_seek(
    current: u64,
    max_offset: impl FnOnce() -> StreamResult<u64>,
    pos: SeekFrom,
) -> StreamResult<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => return Ok(offset),
        SeekFrom::Current(delta) => current as i128 + delta as i128,
        SeekFrom::End(delta) => max_offset()? as i128 + delta as i128,
    };

    if target < 0 {
        return Err(StreamError::NegativeOffset(target));
    }
    u64::try_from(target).map_err(|_| StreamError::OffsetOverflow)
}

impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Io(e) => e,
            StreamError::NegativeOffset(_) | StreamError::OffsetOverflow => {
                io::Error::new(io::ErrorKind::InvalidInput, e)
            }
            StreamError::ReadOnly => io::Error::new(io::ErrorKind::PermissionDenied, e),
            StreamError::Closed => io::Error::new(io::ErrorKind::BrokenPipe, e),
        }
    }
}

/// Exposes a [`ByteStream`] through `std::io::Read`, `Write` and `Seek`.
#[derive(Debug)]
pub struct IoAdapter<S>(pub S);

impl<S: ByteStream> io::Read for IoAdapter<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.read(buf) {
            Ok(n) => Ok(n),
            // The bytes already landed in `buf`; the error resurfaces on the next call.
            Err(e) if e.bytes > 0 => Ok(e.bytes),
            Err(e) => Err(e.source.into()),
        }
    }
}

impl<S: ByteStream> io::Write for IoAdapter<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.write(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.bytes > 0 => Ok(e.bytes),
            Err(e) => Err(e.source.into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: ByteStream> io::Seek for IoAdapter<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.0.seek(pos)?)
    }
}
