//! Byte stream over a local file

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{resolve_seek, ByteStream, PartialTransfer, StreamError, StreamResult, TransferResult};

/// Byte stream backed by a file on the local filesystem.
///
/// The stream keeps its own offset; the OS-level file position is only moved
/// when data is actually read or written.
#[derive(Debug)]
pub struct FileStream {
    file: Option<File>,
    path: PathBuf,
    offset: u64,
    writable: bool,
}

impl FileStream {
    /// Open a file for reading
    pub fn open(path: impl AsRef<Path>) -> StreamResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            offset: 0,
            writable: false,
        })
    }

    /// Open an existing file for reading and writing
    pub fn open_writable(path: impl AsRef<Path>) -> StreamResult<Self> {
        let path = path.as_ref();
        let file = File::options().read(true).write(true).open(path)?;
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            offset: 0,
            writable: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> StreamResult<&File> {
        self.file.as_ref().ok_or(StreamError::Closed)
    }
}

impl ByteStream for FileStream {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn max_offset(&self) -> StreamResult<u64> {
        Ok(self.file()?.metadata()?.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> StreamResult<u64> {
        let file = self.file()?;
        self.offset = resolve_seek(self.offset, || Ok(file.metadata()?.len()), pos)?;
        Ok(self.offset)
    }

    fn read(&mut self, buf: &mut [u8]) -> TransferResult {
        let offset = self.offset;
        let n = {
            let mut file = self.file().map_err(|e| PartialTransfer::new(0, e))?;
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| PartialTransfer::new(0, e))?;
            retry_interrupted(|| file.read(buf))?
        };
        self.offset += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> TransferResult {
        if !self.writable {
            return Err(PartialTransfer::new(0, StreamError::ReadOnly));
        }

        let offset = self.offset;
        let n = {
            let mut file = self.file().map_err(|e| PartialTransfer::new(0, e))?;
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| PartialTransfer::new(0, e))?;
            retry_interrupted(|| file.write(buf))?
        };
        self.offset += n as u64;
        Ok(n)
    }

    fn is_writable(&self) -> bool {
        self.writable && self.file.is_some()
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            log::debug!("Closed {}", self.path.display());
        }
    }

    fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

fn retry_interrupted(mut op: impl FnMut() -> io::Result<usize>) -> TransferResult {
    loop {
        match op() {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PartialTransfer::new(0, e)),
        }
    }
}
