//! Boxer ISO Library
//!
//! Read-only access to ISO 9660 disc images: plain `.iso` files and raw
//! BIN/CUE dumps, with sector-layout detection and lazy directory browsing.

pub mod config;
pub mod disc;
pub mod stream;

#[cfg(test)]
mod testing;

pub use config::ReaderConfig;
pub use disc::{Filesystem, ImageError, ImageResult, IsoImage};
