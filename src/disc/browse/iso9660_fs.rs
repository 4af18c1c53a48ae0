//! ISO 9660 filesystem implementation for directory listing and file reading

use std::ops::Range;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::entry::{DirectoryEntry, EntryInfo, FileEntry};
use super::enumerator::{EnumerationOptions, Enumerator};
use super::filesystem::Filesystem;
use super::paths::PathCache;
use super::record::{parse_directory_extent, DirectoryRecord, FileFlags, Identifier};
use crate::config::ReaderConfig;
use crate::disc::detect::{detect_layout, probe_order};
use crate::disc::formats::LayoutKind;
use crate::disc::iso9660::{PrimaryVolumeDescriptor, PVD_OFFSET, ROOT_RECORD_OFFSET};
use crate::disc::reader::{ImageError, ImageResult, ImageSource};
use crate::stream::{
    share, BlockLayout, BlockPaddedStream, ByteStream, FileStream, SharedSource, SharedStream,
    StreamError, SubRangeStream,
};

/// Read-only stream over one file's data
pub type FileHandle = SubRangeStream<BlockPaddedStream<SharedStream>>;

/// State shared between an image and the entries parsed from it
#[derive(Debug)]
pub(crate) struct Volume {
    source: SharedSource,
    layout: BlockLayout,
    block_size: u64,
    strict: bool,
    directory_parses: AtomicUsize,
}

impl Volume {
    fn logical_stream(&self) -> BlockPaddedStream<SharedStream> {
        BlockPaddedStream::new(SharedStream::new(&self.source), self.layout)
    }

    pub(crate) fn extent_stream(&self, range: &Range<u64>) -> FileHandle {
        SubRangeStream::new(self.logical_stream(), range.start, range.end - range.start)
    }

    /// Read a whole extent. An extent running past the end of the image is an
    /// error rather than a short result.
    pub(crate) fn read_extent(&self, range: &Range<u64>) -> ImageResult<Vec<u8>> {
        let available = self.logical_stream().max_offset()?;
        if range.end > available {
            return Err(truncated(range, available.saturating_sub(range.start)));
        }

        let len = usize::try_from(range.end - range.start)
            .map_err(|_| ImageError::Stream(StreamError::OffsetOverflow))?;
        let mut data = vec![0u8; len];
        let read = self.extent_stream(range).read_fully(&mut data)?;
        if read < len {
            return Err(truncated(range, read as u64));
        }
        Ok(data)
    }

    /// Parse the entries of the directory at `dir_path` whose extent is `range`
    pub(crate) fn parse_directory(
        self: &Arc<Self>,
        dir_path: &str,
        range: &Range<u64>,
    ) -> ImageResult<Vec<Arc<FileEntry>>> {
        self.directory_parses.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Parsing directory {} ({} bytes at {})",
            dir_path,
            range.end - range.start,
            range.start
        );

        let data = self.read_extent(range)?;
        let block_size = self.block_size as usize;
        let records = parse_directory_extent(&data, block_size, range.start, self.strict)?;

        let mut entries = Vec::with_capacity(records.len());
        for record in &records {
            let Identifier::Name { name, version } = &record.identifier else {
                continue;
            };
            let path = if dir_path == "/" {
                format!("/{}", name)
            } else {
                format!("{}/{}", dir_path, name)
            };
            entries.push(Arc::new(self.entry_for_record(record, name, *version, path, range.start)?));
        }

        Ok(entries)
    }

    fn entry_for_record(
        self: &Arc<Self>,
        record: &DirectoryRecord,
        name: &str,
        version: u16,
        path: String,
        record_offset: u64,
    ) -> ImageResult<FileEntry> {
        if record.flags.contains(FileFlags::MULTI_EXTENT) {
            log::warn!("{} spans several extents, only the first is read", path);
        }
        if record.interleave_unit_size != 0 {
            log::warn!("{} is recorded interleaved, contents may be wrong", path);
        }

        let data_range = record
            .data_range(self.block_size)
            .ok_or_else(|| ImageError::MalformedRecord {
                offset: record_offset,
                reason: format!("extent of {} is out of range", path),
            })?;

        let info = EntryInfo {
            file_name: name.to_string(),
            version,
            path,
            extent_lba: record.extent_lba,
            data_range,
            creation_date: record.recorded_at,
            flags: record.flags,
            volume: Arc::downgrade(self),
        };

        Ok(if record.is_directory() {
            FileEntry::Directory(DirectoryEntry::new(info))
        } else {
            FileEntry::File(info)
        })
    }
}

/// An extent that runs past the end of the image
fn truncated(range: &Range<u64>, read: u64) -> ImageError {
    ImageError::MalformedRecord {
        offset: range.start,
        reason: format!(
            "extent is truncated: {} of {} bytes available",
            read,
            range.end - range.start
        ),
    }
}

/// An opened ISO 9660 volume
#[derive(Debug)]
pub struct IsoImage {
    volume: Arc<Volume>,
    name: String,
    layout: LayoutKind,
    descriptor: PrimaryVolumeDescriptor,
    root: Arc<FileEntry>,
    paths: PathCache,
    show_hidden: bool,
}

impl IsoImage {
    /// Open an image file with the default configuration
    pub fn open(path: impl AsRef<Path>) -> ImageResult<Self> {
        Self::open_with_config(path, &ReaderConfig::default())
    }

    /// Open an image file. A `.cue` sheet is resolved to its data file first.
    pub fn open_with_config(path: impl AsRef<Path>, config: &ReaderConfig) -> ImageResult<Self> {
        let source = ImageSource::resolve(path.as_ref())?;
        let stream = FileStream::open(&source.data_path)?;
        Self::from_stream(stream, &source.name, config, source.layout_hint)
    }

    /// Read a volume from any byte stream. `hint` is probed before the
    /// configured layouts.
    pub fn from_stream(
        stream: impl ByteStream + 'static,
        name: &str,
        config: &ReaderConfig,
        hint: Option<LayoutKind>,
    ) -> ImageResult<Self> {
        let source = share(stream);
        let order = probe_order(hint, &config.layouts);
        let layout = detect_layout(&source, &order, name)?;

        let mut logical = BlockPaddedStream::new(SharedStream::new(&source), layout.layout());
        let descriptor = PrimaryVolumeDescriptor::read_from(&mut logical)?;

        let volume = Arc::new(Volume {
            source,
            layout: layout.layout(),
            block_size: u64::from(descriptor.logical_block_size),
            strict: config.strict_endian_check,
            directory_parses: AtomicUsize::new(0),
        });

        let root_offset = PVD_OFFSET + ROOT_RECORD_OFFSET as u64;
        let record = DirectoryRecord::parse(&descriptor.root_directory_record, config.strict_endian_check)
            .map_err(|reason| ImageError::MalformedRecord {
                offset: root_offset,
                reason,
            })?;
        if !record.is_directory() {
            return Err(ImageError::MalformedRecord {
                offset: root_offset,
                reason: "root record is not a directory".to_string(),
            });
        }
        let root = volume.entry_for_record(&record, "", 1, "/".to_string(), root_offset)?;

        log::info!(
            "Opened {}: volume '{}', {} layout, {} byte blocks",
            name,
            descriptor.volume_id,
            layout,
            descriptor.logical_block_size
        );

        Ok(Self {
            volume,
            name: name.to_string(),
            layout,
            descriptor,
            root: Arc::new(root),
            paths: PathCache::new(config.cache_missing_paths),
            show_hidden: config.show_hidden,
        })
    }

    /// Name the image was opened under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logical_block_size(&self) -> u16 {
        self.descriptor.logical_block_size
    }

    /// Sector layout the image was detected as
    pub fn layout(&self) -> LayoutKind {
        self.layout
    }

    pub fn volume_descriptor(&self) -> &PrimaryVolumeDescriptor {
        &self.descriptor
    }

    /// Number of directory extents parsed so far
    pub fn directory_parse_count(&self) -> usize {
        self.volume.directory_parses.load(Ordering::Relaxed)
    }

    /// Number of path lookups that had to walk the tree
    pub fn path_walk_count(&self) -> usize {
        self.paths.walk_count()
    }
}

impl Filesystem for IsoImage {
    fn volume_name(&self) -> &str {
        &self.descriptor.volume_id
    }

    fn root(&self) -> Arc<FileEntry> {
        Arc::clone(&self.root)
    }

    fn entry_at_path(&self, path: &str) -> ImageResult<Arc<FileEntry>> {
        self.paths.resolve(&self.root, path)
    }

    fn enumerate(&self, path: &str) -> ImageResult<Enumerator> {
        self.enumerate_with(
            path,
            EnumerationOptions {
                show_hidden: self.show_hidden,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;
    use crate::testing::{to_raw_mode1, IsoBuilder};
    use std::fs;

    fn hello_image() -> Vec<u8> {
        IsoBuilder::new("HELLO").file("HELLO.TXT", b"hello world").build()
    }

    fn from_bytes(image: Vec<u8>) -> IsoImage {
        IsoImage::from_stream(MemoryStream::new(image), "test.iso", &ReaderConfig::default(), None)
            .unwrap()
    }

    #[test]
    fn test_open_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.iso");
        fs::write(&path, hello_image()).unwrap();

        let image = IsoImage::open(&path).unwrap();
        assert_eq!(image.volume_name(), "HELLO");
        assert_eq!(image.logical_block_size(), 2048);
        assert_eq!(image.layout(), LayoutKind::Mode1Unpadded);
        assert_eq!(image.contents_of_file("/HELLO.TXT").unwrap(), b"hello world");
    }

    #[test]
    fn test_entry_metadata() {
        let image = from_bytes(hello_image());
        let entry = image.entry_at_path("/HELLO.TXT").unwrap();

        assert_eq!(entry.file_name(), "HELLO.TXT");
        assert_eq!(entry.version(), 1);
        assert_eq!(entry.path(), "/HELLO.TXT");
        assert_eq!(entry.size(), 11);
        assert!(!entry.is_directory());
        assert!(!entry.is_hidden());
        let date = entry.creation_date().unwrap();
        assert_eq!(date.to_rfc3339(), "2013-06-15T12:30:00+00:00");
    }

    #[test]
    fn test_raw_mode1_image() {
        let image = IsoImage::from_stream(
            MemoryStream::new(to_raw_mode1(&hello_image())),
            "raw.bin",
            &ReaderConfig::default(),
            None,
        )
        .unwrap();

        assert_eq!(image.layout(), LayoutKind::Mode1);
        assert_eq!(image.contents_of_file("/hello.txt").unwrap(), b"hello world");
    }

    #[test]
    fn test_open_through_cue_sheet() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("game.bin"), to_raw_mode1(&hello_image())).unwrap();
        fs::write(
            dir.path().join("game.cue"),
            "FILE \"game.bin\" BINARY\n  TRACK 01 MODE1/2352\n    INDEX 01 00:00:00\n",
        )
        .unwrap();

        let image = IsoImage::open(dir.path().join("game.cue")).unwrap();
        assert_eq!(image.layout(), LayoutKind::Mode1);
        assert!(image.file_exists("/HELLO.TXT"));
    }

    #[test]
    fn test_nested_directories() {
        let image = from_bytes(
            IsoBuilder::new("NESTED")
                .file("GAME/DATA/LEVEL1.DAT", b"level one")
                .file("GAME/PLAY.EXE", b"MZ")
                .dir("EMPTY")
                .build(),
        );

        assert!(image.is_directory("/GAME"));
        assert!(image.is_directory("/GAME/DATA"));
        assert!(!image.is_directory("/GAME/PLAY.EXE"));
        assert_eq!(image.contents_of_file("/GAME/DATA/LEVEL1.DAT").unwrap(), b"level one");
        assert!(image.list_directory("/EMPTY").unwrap().is_empty());

        let names: Vec<String> = image
            .list_directory("/")
            .unwrap()
            .iter()
            .map(|e| e.file_name().to_string())
            .collect();
        assert_eq!(names, vec!["EMPTY", "GAME"]);
    }

    #[test]
    fn test_logical_errors() {
        let image = from_bytes(IsoBuilder::new("ERRORS").file("DIR/FILE.TXT", b"x").build());

        assert!(matches!(image.entry_at_path("/MISSING"), Err(ImageError::NotFound(_))));
        assert!(matches!(
            image.list_directory("/DIR/FILE.TXT"),
            Err(ImageError::NotADirectory(path)) if path == "/DIR/FILE.TXT"
        ));
        assert!(matches!(image.contents_of_file("/DIR"), Err(ImageError::IsADirectory(_))));
        assert!(matches!(
            image.entry_at_path("/DIR/FILE.TXT/MORE"),
            Err(ImageError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_read_file_range_and_handle() {
        let image = from_bytes(hello_image());

        assert_eq!(image.read_file_range("/HELLO.TXT", 6, 100).unwrap(), b"world");
        assert!(image.read_file_range("/HELLO.TXT", 20, 4).unwrap().is_empty());

        let mut handle = image.open_file("/HELLO.TXT").unwrap();
        assert_eq!(handle.max_offset().unwrap(), 11);
        let mut buf = [0u8; 32];
        assert_eq!(handle.read_fully(&mut buf).unwrap(), 11);
        assert_eq!(&buf[..11], b"hello world");
    }

    #[test]
    fn test_entries_fail_after_image_dropped() {
        let image = from_bytes(hello_image());
        let entry = image.entry_at_path("/HELLO.TXT").unwrap();
        let mut handle = entry.open().unwrap();
        drop(image);

        assert!(matches!(entry.contents(), Err(ImageError::Closed)));
        let mut buf = [0u8; 4];
        assert!(handle.read(&mut buf).is_err());
    }

    #[test]
    fn test_corrupt_subtree_leaves_siblings_usable() {
        let builder = IsoBuilder::new("CORRUPT")
            .file("BAD/A.TXT", b"bad")
            .file("GOOD/B.TXT", b"good");
        let mut bytes = builder.build();
        // First record after "." and ".." claims an impossible length
        let bad = builder.directory_lba("/BAD") as usize * 2048 + 68;
        bytes[bad] = 10;

        let image = from_bytes(bytes);
        match image.list_directory("/BAD") {
            Err(ImageError::MalformedRecord { offset, .. }) => assert_eq!(offset as usize, bad),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(image.contents_of_file("/GOOD/B.TXT").unwrap(), b"good");
        // Not cached: the failure repeats
        assert!(image.list_directory("/BAD").is_err());
    }

    #[test]
    fn test_directory_spanning_sectors() {
        let mut builder = IsoBuilder::new("MANY");
        for i in 0..60 {
            builder = builder.file(&format!("FILE{:02}.TXT", i), format!("file {}", i).as_bytes());
        }
        let image = from_bytes(builder.build());

        let entries = image.list_directory("/").unwrap();
        assert_eq!(entries.len(), 60);
        assert_eq!(entries[59].file_name(), "FILE59.TXT");
        assert_eq!(image.contents_of_file("/FILE59.TXT").unwrap(), b"file 59");
    }

    #[test]
    fn test_subentries_parsed_once() {
        let image = from_bytes(IsoBuilder::new("LAZY").file("DIR/A.TXT", b"a").build());
        assert_eq!(image.directory_parse_count(), 0);

        image.list_directory("/DIR").unwrap();
        image.list_directory("/DIR").unwrap();
        image.contents_of_file("/DIR/A.TXT").unwrap();
        assert_eq!(image.directory_parse_count(), 2);
    }

    #[test]
    fn test_unrecognized_image() {
        let result = IsoImage::from_stream(
            MemoryStream::new(vec![0u8; 64 * 1024]),
            "zeros.iso",
            &ReaderConfig::default(),
            None,
        );
        assert!(matches!(result, Err(ImageError::UnrecognizedFormat(name)) if name == "zeros.iso"));
    }

    #[test]
    fn test_truncated_file_extent() {
        let mut bytes = IsoBuilder::new("SHORT").file("BIG.DAT", &[7u8; 4096]).build();
        bytes.truncate(bytes.len() - 2048);

        let image = from_bytes(bytes);
        let start = image.entry_at_path("/BIG.DAT").unwrap().data_range().start;
        let err = image.contents_of_file("/BIG.DAT").unwrap_err();
        assert!(
            matches!(err, ImageError::MalformedRecord { offset, .. } if offset == start),
            "unexpected error: {:?}",
            err
        );
        assert!(!err.is_io());
    }
}
