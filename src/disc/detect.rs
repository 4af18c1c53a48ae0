//! Sector layout detection
//!
//! A raw image is tried against each candidate layout in turn: the image is
//! viewed through a [`BlockPaddedStream`] for that layout and the first volume
//! descriptor is checked for the `CD001` signature.

use std::io::SeekFrom;

use super::formats::LayoutKind;
use super::iso9660::{ISO9660_IDENTIFIER, PVD_OFFSET};
use super::reader::{ImageError, ImageResult};
use crate::stream::{BlockPaddedStream, ByteStream, SharedSource, SharedStream, StreamError};

enum Probe {
    Match,
    Mismatch,
    Failed(StreamError),
}

fn probe(source: &SharedSource, kind: LayoutKind) -> Probe {
    let mut stream = BlockPaddedStream::new(SharedStream::new(source), kind.layout());
    if let Err(e) = stream.seek(SeekFrom::Start(PVD_OFFSET)) {
        return Probe::Failed(e);
    }

    let mut header = [0u8; 6];
    match stream.read_fully(&mut header) {
        Ok(n) if n == header.len() && &header[1..6] == ISO9660_IDENTIFIER => Probe::Match,
        Ok(_) => Probe::Mismatch,
        Err(e) => Probe::Failed(e.source),
    }
}

/// Find the first candidate layout holding an ISO 9660 volume.
///
/// Layouts that cannot hold a volume are skipped. I/O failures on a candidate
/// count as a mismatch, unless every candidate failed that way, in which case
/// the first failure is returned.
pub fn detect_layout(
    source: &SharedSource,
    candidates: &[LayoutKind],
    name: &str,
) -> ImageResult<LayoutKind> {
    let mut tried = 0;
    let mut failures = Vec::new();

    for &kind in candidates.iter().filter(|kind| kind.is_probeable()) {
        tried += 1;
        match probe(source, kind) {
            Probe::Match => {
                log::debug!("{}: detected {}", name, kind);
                return Ok(kind);
            }
            Probe::Mismatch => log::debug!("{}: no volume descriptor as {}", name, kind),
            Probe::Failed(e) => {
                log::debug!("{}: probing {} failed: {}", name, kind, e);
                failures.push(e);
            }
        }
    }

    if tried > 0 && failures.len() == tried {
        if let Some(first) = failures.into_iter().next() {
            return Err(ImageError::Stream(first));
        }
    }
    Err(ImageError::UnrecognizedFormat(name.to_string()))
}

/// Probe order for an image: the hint first, then `layouts`, without repeats
pub fn probe_order(hint: Option<LayoutKind>, layouts: &[LayoutKind]) -> Vec<LayoutKind> {
    let mut order: Vec<LayoutKind> = Vec::with_capacity(layouts.len() + 1);
    for kind in hint.into_iter().chain(layouts.iter().copied()) {
        if !order.contains(&kind) {
            order.push(kind);
        }
    }
    order
}
