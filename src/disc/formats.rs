//! Disc image formats and raw sector layouts

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::stream::BlockLayout;

/// Disc image file formats recognised by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscFormat {
    /// Cooked ISO 9660 image (.iso, .cdr, .toast)
    Iso,
    /// Cue sheet pointing at a raw image
    Cue,
    /// Raw image without a cue sheet (.bin, .img)
    Bin,
}

impl DiscFormat {
    /// Detect disc format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "iso" | "cdr" | "toast" => Some(Self::Iso),
            "cue" => Some(Self::Cue),
            "bin" | "img" => Some(Self::Bin),
            _ => None,
        }
    }

    /// Get the display name for this format
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Iso => "ISO 9660",
            Self::Cue => "BIN/CUE",
            Self::Bin => "Raw BIN",
        }
    }

    /// Get supported file extensions for this format
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Iso => &["iso", "cdr", "toast"],
            Self::Cue => &["cue"],
            Self::Bin => &["bin", "img"],
        }
    }
}

/// Get all supported file extensions
pub fn supported_extensions() -> Vec<&'static str> {
    [DiscFormat::Iso, DiscFormat::Cue, DiscFormat::Bin]
        .iter()
        .flat_map(|format| format.extensions().iter().copied())
        .collect()
}

/// Physical sector layouts found in CD images.
///
/// Sizes are payload / lead-in / lead-out in bytes. The Mode 2 variants follow
/// the CD-ROM XA (Yellow Book) sector tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// 2048-byte cooked sectors (.iso)
    Mode1Unpadded,
    /// 2352-byte raw Mode 1: sync and header, payload, EDC/ECC
    Mode1,
    /// 2352-byte raw formless Mode 2
    Mode2,
    /// 2336-byte Mode 2 Form 1 without sync and header
    Mode2Cooked,
    /// 2352-byte raw XA Mode 2 Form 1
    XaMode2Form1,
    /// 2352-byte raw XA Mode 2 Form 2
    XaMode2Form2,
    /// 2352-byte CD audio
    Audio,
}

/// Layouts probed when nothing better is known, in order
pub const DEFAULT_PROBE_ORDER: [LayoutKind; 4] = [
    LayoutKind::Mode1Unpadded,
    LayoutKind::Mode1,
    LayoutKind::XaMode2Form1,
    LayoutKind::Mode2Cooked,
];

impl LayoutKind {
    pub const ALL: [LayoutKind; 7] = [
        LayoutKind::Mode1Unpadded,
        LayoutKind::Mode1,
        LayoutKind::Mode2,
        LayoutKind::Mode2Cooked,
        LayoutKind::XaMode2Form1,
        LayoutKind::XaMode2Form2,
        LayoutKind::Audio,
    ];

    pub const fn layout(self) -> BlockLayout {
        match self {
            Self::Mode1Unpadded => BlockLayout::new(2048, 0, 0),
            Self::Mode1 => BlockLayout::new(2048, 16, 288),
            Self::Mode2 => BlockLayout::new(2336, 16, 0),
            Self::Mode2Cooked => BlockLayout::new(2048, 8, 280),
            Self::XaMode2Form1 => BlockLayout::new(2048, 24, 280),
            Self::XaMode2Form2 => BlockLayout::new(2324, 24, 4),
            Self::Audio => BlockLayout::new(2352, 0, 0),
        }
    }

    /// Whether an ISO 9660 volume can live in this layout.
    /// Only layouts with 2048-byte payloads qualify.
    pub const fn is_probeable(self) -> bool {
        self.layout().block_size == 2048
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Mode1Unpadded => "ISO (2048-byte sectors)",
            Self::Mode1 => "Mode 1 (2352-byte sectors)",
            Self::Mode2 => "Mode 2 formless (2352-byte sectors)",
            Self::Mode2Cooked => "Mode 2 Form 1 (2336-byte sectors)",
            Self::XaMode2Form1 => "XA Mode 2 Form 1 (2352-byte sectors)",
            Self::XaMode2Form2 => "XA Mode 2 Form 2 (2352-byte sectors)",
            Self::Audio => "CD audio (2352-byte sectors)",
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
