//! In-memory byte stream

use std::io::SeekFrom;

use super::{resolve_seek, ByteStream, PartialTransfer, StreamError, StreamResult, TransferResult};

/// Byte stream over an owned buffer.
///
/// Read-only unless created with [`MemoryStream::writable`]. Writing past the
/// end grows the buffer, zero-filling any gap.
#[derive(Debug, Clone, Default)]
pub struct MemoryStream {
    data: Vec<u8>,
    offset: u64,
    writable: bool,
    closed: bool,
}

impl MemoryStream {
    /// Create a read-only stream over `data`
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            offset: 0,
            writable: false,
            closed: false,
        }
    }

    /// Create a read-write stream over `data`
    pub fn writable(data: Vec<u8>) -> Self {
        Self {
            writable: true,
            ..Self::new(data)
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl ByteStream for MemoryStream {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn max_offset(&self) -> StreamResult<u64> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        Ok(self.data.len() as u64)
    }

    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let len = self.data.len() as u64;
        self.offset = resolve_seek(self.offset, || Ok(len), pos)?;
        Ok(self.offset)
    }

    fn read(&mut self, buf: &mut [u8]) -> TransferResult {
        if self.closed {
            return Err(PartialTransfer::new(0, StreamError::Closed));
        }
        let len = self.data.len() as u64;
        if self.offset >= len {
            return Ok(0);
        }

        let start = self.offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.offset += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> TransferResult {
        if self.closed {
            return Err(PartialTransfer::new(0, StreamError::Closed));
        }
        if !self.writable {
            return Err(PartialTransfer::new(0, StreamError::ReadOnly));
        }

        let start = usize::try_from(self.offset)
            .map_err(|_| PartialTransfer::new(0, StreamError::OffsetOverflow))?;
        let end = start + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        self.offset = end as u64;
        Ok(buf.len())
    }

    fn is_writable(&self) -> bool {
        self.writable && !self.closed
    }

    fn close(&mut self) {
        self.closed = true;
        self.data = Vec::new();
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
