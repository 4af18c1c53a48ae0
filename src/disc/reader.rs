//! Disc image opening
//!
//! Error type shared by the image reader, and resolution of the file a disc
//! image's sectors are actually stored in.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::bincue::{bin_path_for_sheet, read_cue_sheet, CueError};
use super::formats::{DiscFormat, LayoutKind};
use crate::stream::{PartialTransfer, StreamError};

/// Errors that can occur when reading disc images
#[derive(Error, Debug)]
pub enum ImageError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Cue(#[from] CueError),

    #[error("Unrecognized image format: {0}")]
    UnrecognizedFormat(String),

    #[error("No primary volume descriptor found")]
    NoPrimaryVolumeDescriptor,

    #[error("Malformed record at byte {offset}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Image is closed")]
    Closed,
}

pub type ImageResult<T> = Result<T, ImageError>;

impl From<PartialTransfer> for ImageError {
    fn from(e: PartialTransfer) -> Self {
        Self::Stream(e.source)
    }
}

impl From<io::Error> for ImageError {
    fn from(e: io::Error) -> Self {
        Self::Stream(StreamError::Io(e))
    }
}

impl ImageError {
    /// Whether the error comes from the underlying byte source
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Stream(StreamError::Io(_)) | Self::Cue(CueError::Io(_)))
    }
}

/// Where the sectors of a disc image live
#[derive(Debug, Clone)]
pub struct ImageSource {
    /// File holding the sectors (the BIN file for a cue sheet)
    pub data_path: PathBuf,
    /// Format by extension of the path that was opened
    pub format: Option<DiscFormat>,
    /// Layout declared by the cue sheet's data track
    pub layout_hint: Option<LayoutKind>,
    /// Display name for the image
    pub name: String,
}

impl ImageSource {
    /// Resolve the image at `path`, following a cue sheet to its data file
    pub fn resolve(path: &Path) -> ImageResult<Self> {
        let format = DiscFormat::from_path(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match format {
            Some(DiscFormat::Cue) => {
                let sheet = read_cue_sheet(path)?;
                let data_path = bin_path_for_sheet(path, &sheet)?;
                let layout_hint = sheet.data_track_layout();
                log::debug!(
                    "{}: data in {}, layout hint {:?}",
                    name,
                    data_path.display(),
                    layout_hint
                );
                Ok(Self {
                    data_path,
                    format,
                    layout_hint,
                    name,
                })
            }
            Some(DiscFormat::Iso) | Some(DiscFormat::Bin) => Ok(Self {
                data_path: path.to_path_buf(),
                format,
                layout_hint: None,
                name,
            }),
            None => {
                log::debug!("{}: unknown extension, probing as a raw image", name);
                Ok(Self {
                    data_path: path.to_path_buf(),
                    format,
                    layout_hint: None,
                    name,
                })
            }
        }
    }
}
