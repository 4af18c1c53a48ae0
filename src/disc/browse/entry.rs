//! File entry structures for disc filesystem browsing

use std::ops::Range;
use std::sync::{Arc, OnceLock, Weak};

use chrono::{DateTime, FixedOffset};

use super::iso9660_fs::{FileHandle, Volume};
use super::record::FileFlags;
use crate::disc::reader::{ImageError, ImageResult};

/// Data shared by files and directories
#[derive(Debug)]
pub struct EntryInfo {
    pub(crate) file_name: String,
    pub(crate) version: u16,
    /// Full path from root (e.g., "/INSTALL/SETUP.EXE")
    pub(crate) path: String,
    pub(crate) extent_lba: u32,
    pub(crate) data_range: Range<u64>,
    pub(crate) creation_date: Option<DateTime<FixedOffset>>,
    pub(crate) flags: FileFlags,
    pub(crate) volume: Weak<Volume>,
}

impl EntryInfo {
    fn volume(&self) -> ImageResult<Arc<Volume>> {
        self.volume.upgrade().ok_or(ImageError::Closed)
    }
}

/// A directory, whose children are parsed on first access and then cached
#[derive(Debug)]
pub struct DirectoryEntry {
    info: EntryInfo,
    subentries: OnceLock<Vec<Arc<FileEntry>>>,
}

impl DirectoryEntry {
    pub(crate) fn new(info: EntryInfo) -> Self {
        Self {
            info,
            subentries: OnceLock::new(),
        }
    }

    pub fn info(&self) -> &EntryInfo {
        &self.info
    }

    /// Entries in this directory, excluding "." and "..".
    ///
    /// A failed parse is not cached; the next call tries again.
    pub fn subentries(&self) -> ImageResult<&[Arc<FileEntry>]> {
        if let Some(entries) = self.subentries.get() {
            return Ok(entries);
        }

        let volume = self.info.volume()?;
        let parsed = volume.parse_directory(&self.info.path, &self.info.data_range)?;
        Ok(self.subentries.get_or_init(|| parsed))
    }

    /// Entries if they have already been parsed
    pub fn cached_subentries(&self) -> Option<&[Arc<FileEntry>]> {
        self.subentries.get().map(Vec::as_slice)
    }
}

/// A single file or directory on an ISO 9660 volume
#[derive(Debug)]
pub enum FileEntry {
    File(EntryInfo),
    Directory(DirectoryEntry),
}

impl FileEntry {
    pub fn info(&self) -> &EntryInfo {
        match self {
            Self::File(info) => info,
            Self::Directory(dir) => &dir.info,
        }
    }

    /// Name without the version suffix
    pub fn file_name(&self) -> &str {
        &self.info().file_name
    }

    pub fn version(&self) -> u16 {
        self.info().version
    }

    pub fn path(&self) -> &str {
        &self.info().path
    }

    /// Size of the entry's data in bytes
    pub fn size(&self) -> u64 {
        let range = &self.info().data_range;
        range.end - range.start
    }

    /// Location of the data in the volume's logical byte space
    pub fn data_range(&self) -> Range<u64> {
        self.info().data_range.clone()
    }

    pub fn extent_lba(&self) -> u32 {
        self.info().extent_lba
    }

    pub fn creation_date(&self) -> Option<DateTime<FixedOffset>> {
        self.info().creation_date
    }

    pub fn flags(&self) -> FileFlags {
        self.info().flags
    }

    pub fn is_hidden(&self) -> bool {
        self.flags().contains(FileFlags::HIDDEN)
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    pub fn as_directory(&self) -> Option<&DirectoryEntry> {
        match self {
            Self::Directory(dir) => Some(dir),
            Self::File(_) => None,
        }
    }

    /// Case-insensitive name comparison
    pub fn matches_name(&self, name: &str) -> bool {
        let own = self.file_name();
        own.eq_ignore_ascii_case(name) || own.to_lowercase() == name.to_lowercase()
    }

    /// Children of a directory
    pub fn subentries(&self) -> ImageResult<&[Arc<FileEntry>]> {
        match self {
            Self::Directory(dir) => dir.subentries(),
            Self::File(info) => Err(ImageError::NotADirectory(info.path.clone())),
        }
    }

    /// Read the entire contents of a file
    pub fn contents(&self) -> ImageResult<Vec<u8>> {
        match self {
            Self::File(info) => info.volume()?.read_extent(&info.data_range),
            Self::Directory(dir) => Err(ImageError::IsADirectory(dir.info.path.clone())),
        }
    }

    /// Open a stream over a file's contents
    pub fn open(&self) -> ImageResult<FileHandle> {
        match self {
            Self::File(info) => Ok(info.volume()?.extent_stream(&info.data_range)),
            Self::Directory(dir) => Err(ImageError::IsADirectory(dir.info.path.clone())),
        }
    }

    /// Get a display-friendly size string
    pub fn size_string(&self) -> String {
        if self.is_directory() {
            return String::new();
        }

        let size = self.size();
        if size < 1024 {
            format!("{} B", size)
        } else if size < 1024 * 1024 {
            format!("{:.1} KB", size as f64 / 1024.0)
        } else {
            format!("{:.1} MB", size as f64 / (1024.0 * 1024.0))
        }
    }
}
