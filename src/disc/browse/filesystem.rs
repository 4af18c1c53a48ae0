//! Filesystem trait for disc image browsing

use std::io::SeekFrom;
use std::sync::Arc;

use super::entry::FileEntry;
use super::enumerator::{EnumerationOptions, Enumerator};
use super::iso9660_fs::FileHandle;
use crate::disc::reader::ImageResult;
use crate::stream::ByteStream;

/// Path-based access to a volume's files.
///
/// Paths are slash-separated from the root (`/`); name comparison is
/// case-insensitive.
pub trait Filesystem: Send + Sync {
    /// Get the volume label/name
    fn volume_name(&self) -> &str;

    /// Get the root directory entry
    fn root(&self) -> Arc<FileEntry>;

    /// Look up the entry at `path`
    fn entry_at_path(&self, path: &str) -> ImageResult<Arc<FileEntry>>;

    /// Walk everything below the directory at `path` with default options
    fn enumerate(&self, path: &str) -> ImageResult<Enumerator>;

    fn enumerate_with(&self, path: &str, options: EnumerationOptions) -> ImageResult<Enumerator> {
        Enumerator::new(self.entry_at_path(path)?, options)
    }

    fn file_exists(&self, path: &str) -> bool {
        self.entry_at_path(path).is_ok()
    }

    fn is_directory(&self, path: &str) -> bool {
        matches!(self.entry_at_path(path), Ok(entry) if entry.is_directory())
    }

    /// List contents of a directory
    fn list_directory(&self, path: &str) -> ImageResult<Vec<Arc<FileEntry>>> {
        Ok(self.entry_at_path(path)?.subentries()?.to_vec())
    }

    /// Read entire file contents
    fn contents_of_file(&self, path: &str) -> ImageResult<Vec<u8>> {
        self.entry_at_path(path)?.contents()
    }

    /// Open a stream over a file's contents
    fn open_file(&self, path: &str) -> ImageResult<FileHandle> {
        self.entry_at_path(path)?.open()
    }

    /// Read partial file contents (for large files). The result is short when
    /// the range runs past the end of the file.
    fn read_file_range(&self, path: &str, offset: u64, length: usize) -> ImageResult<Vec<u8>> {
        let mut handle = self.open_file(path)?;
        let available = handle.max_offset()?.saturating_sub(offset);
        let length = length.min(usize::try_from(available).unwrap_or(usize::MAX));
        if length == 0 {
            return Ok(Vec::new());
        }

        handle.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0u8; length];
        let read = handle.read_fully(&mut data)?;
        data.truncate(read);
        Ok(data)
    }
}
