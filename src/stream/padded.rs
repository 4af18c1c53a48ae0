//! Logical view over a stream of padded fixed-size blocks
//!
//! Raw CD images store each 2048-byte payload inside a larger physical sector
//! that also carries sync, header and error-correction bytes. A
//! [`BlockPaddedStream`] hides that padding and presents the payloads as one
//! contiguous stream.

use std::io::SeekFrom;

use super::{resolve_seek, ByteStream, PartialTransfer, StreamError, StreamResult, TransferResult};

/// Sizes of the payload and the padding around it in each physical block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockLayout {
    /// Payload bytes per block
    pub block_size: u64,
    /// Padding bytes before each payload
    pub lead_in: u64,
    /// Padding bytes after each payload
    pub lead_out: u64,
}

impl BlockLayout {
    pub const fn new(block_size: u64, lead_in: u64, lead_out: u64) -> Self {
        Self {
            block_size,
            lead_in,
            lead_out,
        }
    }

    /// Size of one physical block including padding
    pub const fn raw_block_size(&self) -> u64 {
        self.lead_in + self.block_size + self.lead_out
    }

    pub const fn is_unpadded(&self) -> bool {
        self.lead_in == 0 && self.lead_out == 0
    }

    /// Offset in the padded source of a logical offset
    pub fn source_offset_for_logical_offset(&self, offset: u64) -> Option<u64> {
        if self.block_size == 0 {
            return None;
        }
        let block = offset / self.block_size;
        let within = offset % self.block_size;
        block
            .checked_mul(self.raw_block_size())?
            .checked_add(self.lead_in + within)
    }

    /// Logical offset of a source offset, or `None` if it falls in padding
    pub fn logical_offset_for_source_offset(&self, offset: u64) -> Option<u64> {
        if self.block_size == 0 {
            return None;
        }
        let raw = self.raw_block_size();
        let block = offset / raw;
        let within = offset % raw;
        if within < self.lead_in || within >= self.lead_in + self.block_size {
            return None;
        }
        Some(block * self.block_size + (within - self.lead_in))
    }

    /// Logical length of a source of `source_len` bytes. A trailing partial
    /// block contributes whatever payload bytes it holds.
    pub fn logical_length(&self, source_len: u64) -> u64 {
        let raw = self.raw_block_size();
        if raw == 0 {
            return 0;
        }
        let full_blocks = source_len / raw;
        let tail = (source_len % raw)
            .saturating_sub(self.lead_in)
            .min(self.block_size);
        full_blocks * self.block_size + tail
    }
}

/// Stream that exposes only the payload bytes of a padded block source
#[derive(Debug)]
pub struct BlockPaddedStream<S> {
    source: S,
    layout: BlockLayout,
    offset: u64,
    closed: bool,
}

impl<S: ByteStream> BlockPaddedStream<S> {
    pub fn new(source: S, layout: BlockLayout) -> Self {
        Self {
            source,
            layout,
            offset: 0,
            closed: false,
        }
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    pub fn source_offset_for_logical_offset(&self, offset: u64) -> Option<u64> {
        self.layout.source_offset_for_logical_offset(offset)
    }

    pub fn logical_offset_for_source_offset(&self, offset: u64) -> Option<u64> {
        self.layout.logical_offset_for_source_offset(offset)
    }

    /// Length of the next chunk that stays inside the current block
    fn chunk_len(&self, wanted: usize) -> usize {
        if self.layout.is_unpadded() || self.layout.block_size == 0 {
            return wanted;
        }
        let left_in_block = self.layout.block_size - self.offset % self.layout.block_size;
        wanted.min(usize::try_from(left_in_block).unwrap_or(usize::MAX))
    }

    fn seek_source(&mut self) -> StreamResult<()> {
        let target = self
            .layout
            .source_offset_for_logical_offset(self.offset)
            .ok_or(StreamError::OffsetOverflow)?;
        self.source.seek(SeekFrom::Start(target))?;
        Ok(())
    }
}

impl<S: ByteStream> ByteStream for BlockPaddedStream<S> {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn max_offset(&self) -> StreamResult<u64> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        Ok(self.layout.logical_length(self.source.max_offset()?))
    }

    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        self.offset = resolve_seek(self.offset, || self.max_offset(), pos)?;
        Ok(self.offset)
    }

    fn read(&mut self, buf: &mut [u8]) -> TransferResult {
        if self.closed {
            return Err(PartialTransfer::new(0, StreamError::Closed));
        }

        let mut total = 0;
        while total < buf.len() {
            let chunk = self.chunk_len(buf.len() - total);
            self.seek_source()
                .map_err(|e| PartialTransfer::new(total, e))?;

            let n = match self.source.read_fully(&mut buf[total..total + chunk]) {
                Ok(n) => n,
                Err(e) => {
                    self.offset += e.bytes as u64;
                    return Err(PartialTransfer::new(total + e.bytes, e.source));
                }
            };
            total += n;
            self.offset += n as u64;
            if n < chunk {
                break;
            }
        }
        Ok(total)
    }

    fn write(&mut self, buf: &[u8]) -> TransferResult {
        if self.closed {
            return Err(PartialTransfer::new(0, StreamError::Closed));
        }
        if !self.source.is_writable() {
            return Err(PartialTransfer::new(0, StreamError::ReadOnly));
        }

        let mut total = 0;
        while total < buf.len() {
            let chunk = self.chunk_len(buf.len() - total);
            self.seek_source()
                .map_err(|e| PartialTransfer::new(total, e))?;

            match self.source.write_all(&buf[total..total + chunk]) {
                Ok(n) => {
                    total += n;
                    self.offset += n as u64;
                }
                Err(e) => {
                    self.offset += e.bytes as u64;
                    return Err(PartialTransfer::new(total + e.bytes, e.source));
                }
            }
        }
        Ok(total)
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
