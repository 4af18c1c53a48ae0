//! Byte stream restricted to a sub-range of another stream

use std::io::SeekFrom;
use std::ops::Range;

use super::{resolve_seek, ByteStream, PartialTransfer, StreamError, StreamResult, TransferResult};

/// A view of `length` bytes of a source stream starting at `start`.
///
/// Offsets are local to the range. Seeking past the end of the range is
/// allowed, but reads from there return nothing.
#[derive(Debug)]
pub struct SubRangeStream<S> {
    source: S,
    start: u64,
    length: u64,
    offset: u64,
    closed: bool,
}

impl<S: ByteStream> SubRangeStream<S> {
    pub fn new(source: S, start: u64, length: u64) -> Self {
        Self {
            source,
            start,
            length,
            offset: 0,
            closed: false,
        }
    }

    /// Source-space byte range visible through this stream
    pub fn range(&self) -> Range<u64> {
        self.start..self.start.saturating_add(self.length)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    pub fn source_offset_for_local_offset(&self, offset: u64) -> Option<u64> {
        self.start.checked_add(offset)
    }

    /// Local offset for a source offset, or `None` if it lies before the range
    pub fn local_offset_for_source_offset(&self, offset: u64) -> Option<u64> {
        offset.checked_sub(self.start)
    }

    fn remaining(&self) -> usize {
        let left = self.length.saturating_sub(self.offset);
        usize::try_from(left).unwrap_or(usize::MAX)
    }

    fn transfer(
        &mut self,
        len: usize,
        op: impl FnOnce(&mut S, usize) -> TransferResult,
    ) -> TransferResult {
        if self.closed {
            return Err(PartialTransfer::new(0, StreamError::Closed));
        }
        let len = len.min(self.remaining());
        if len == 0 {
            return Ok(0);
        }

        let target = self
            .source_offset_for_local_offset(self.offset)
            .ok_or_else(|| PartialTransfer::new(0, StreamError::OffsetOverflow))?;
        self.source
            .seek(SeekFrom::Start(target))
            .map_err(|e| PartialTransfer::new(0, e))?;

        match op(&mut self.source, len) {
            Ok(n) => {
                self.offset += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.offset += e.bytes as u64;
                Err(e)
            }
        }
    }
}

impl<S: ByteStream> ByteStream for SubRangeStream<S> {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn max_offset(&self) -> StreamResult<u64> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        Ok(self.length)
    }

    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let length = self.length;
        self.offset = resolve_seek(self.offset, || Ok(length), pos)?;
        Ok(self.offset)
    }

    fn read(&mut self, buf: &mut [u8]) -> TransferResult {
        self.transfer(buf.len(), |source, len| source.read_fully(&mut buf[..len]))
    }

    fn write(&mut self, buf: &[u8]) -> TransferResult {
        if !self.closed && !self.source.is_writable() {
            return Err(PartialTransfer::new(0, StreamError::ReadOnly));
        }
        self.transfer(buf.len(), |source, len| source.write_all(&buf[..len]))
    }

    fn is_writable(&self) -> bool {
        !self.closed && self.source.is_writable()
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed || self.source.is_closed()
    }
}
