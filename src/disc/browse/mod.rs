//! Disc filesystem browsing module
//!
//! Provides the ISO 9660 directory tree of an opened image: lazily parsed
//! entries, cached path lookup and depth-first enumeration.

pub mod entry;
pub mod enumerator;
pub mod filesystem;
pub mod iso9660_fs;
pub mod paths;
pub mod record;

pub use entry::{DirectoryEntry, EntryInfo, FileEntry};
pub use enumerator::{EnumeratedEntry, EnumerationOptions, Enumerator};
pub use filesystem::Filesystem;
pub use iso9660_fs::{FileHandle, IsoImage};
pub use paths::{normalize_path, PathCache};
pub use record::{DirectoryRecord, FileFlags, Identifier};
