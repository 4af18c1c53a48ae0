//! Cursors over a single shared source stream

use std::io::SeekFrom;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::{resolve_seek, ByteStream, PartialTransfer, StreamError, StreamResult, TransferResult};

/// A source stream that several [`SharedStream`] cursors can read from.
///
/// Whoever holds the `Arc` owns the source; cursors only keep a weak reference.
pub type SharedSource = Arc<Mutex<Box<dyn ByteStream>>>;

/// Wrap a stream so it can be shared between cursors
pub fn share(stream: impl ByteStream + 'static) -> SharedSource {
    Arc::new(Mutex::new(Box::new(stream)))
}

/// An independent cursor over a [`SharedSource`].
///
/// Each cursor has its own offset; every read or write seeks the source and
/// transfers data while holding the source lock, so cursors may be used from
/// different threads. Once the owner drops the source, all operations fail
/// with [`StreamError::Closed`].
#[derive(Debug, Clone)]
pub struct SharedStream {
    source: Weak<Mutex<Box<dyn ByteStream>>>,
    offset: u64,
    closed: bool,
}

impl SharedStream {
    pub fn new(source: &SharedSource) -> Self {
        Self {
            source: Arc::downgrade(source),
            offset: 0,
            closed: false,
        }
    }

    fn with_source<T>(
        &self,
        f: impl FnOnce(&mut dyn ByteStream) -> T,
    ) -> StreamResult<T> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        let source = self.source.upgrade().ok_or(StreamError::Closed)?;
        // A panic elsewhere cannot leave the source in a torn state: every
        // transfer starts with an explicit seek.
        let mut guard = source.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut **guard))
    }

    fn transfer(
        &mut self,
        op: impl FnOnce(&mut dyn ByteStream) -> TransferResult,
    ) -> TransferResult {
        let offset = self.offset;
        let result = self
            .with_source(|source| {
                source
                    .seek(SeekFrom::Start(offset))
                    .map_err(|e| PartialTransfer::new(0, e))?;
                op(source)
            })
            .map_err(|e| PartialTransfer::new(0, e))?;

        match result {
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

impl ByteStream for SharedStream {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn max_offset(&self) -> StreamResult<u64> {
        self.with_source(|source| source.max_offset())?
    }

    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        if self.closed {
            return Err(StreamError::Closed);
        }
        self.offset = resolve_seek(self.offset, || self.max_offset(), pos)?;
        Ok(self.offset)
    }

    fn read(&mut self, buf: &mut [u8]) -> TransferResult {
        self.transfer(|source| source.read(buf))
    }

    fn write(&mut self, buf: &[u8]) -> TransferResult {
        self.transfer(|source| source.write(buf))
    }

    fn is_writable(&self) -> bool {
        self.with_source(|source| source.is_writable())
            .unwrap_or(false)
    }

    /// Closes this cursor only; the shared source stays open for its owner.
    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed || self.source.strong_count() == 0
    }
}
