//! Disc image handling module
//!
//! Provides functionality for opening ISO 9660 disc images, whether plain
//! 2048-byte-sector images or raw BIN/CUE dumps, and browsing their files.

pub mod bincue;
pub mod browse;
mod detect;
mod formats;
pub mod iso9660;
mod reader;

pub use bincue::{CueError, CueFile, CueSheet, CueTrack, TrackMode};
pub use browse::{
    EnumeratedEntry, EnumerationOptions, Enumerator, FileEntry, FileHandle, Filesystem, IsoImage,
};
pub use detect::{detect_layout, probe_order};
pub use formats::{supported_extensions, DiscFormat, LayoutKind, DEFAULT_PROBE_ORDER};
pub use iso9660::PrimaryVolumeDescriptor;
pub use reader::{ImageError, ImageResult, ImageSource};
