//! ISO 9660 directory records
//!
//! A directory extent is a sequence of variable-length records packed into
//! logical sectors. Records never cross a sector boundary; the unused tail of
//! a sector is zero-filled.

use std::ops::Range;

use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, FixedOffset};

use crate::disc::iso9660::parse_binary_timestamp;
use crate::disc::reader::{ImageError, ImageResult};

/// Smallest possible record: the fixed fields plus a one-byte identifier
pub const DIRECTORY_RECORD_MIN_LENGTH: usize = 34;

/// Length of the fixed part of a record, before the identifier
const FIXED_LENGTH: usize = 33;

bitflags! {
    /// File flags byte of a directory record
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileFlags: u8 {
        const HIDDEN = 0x01;
        const DIRECTORY = 0x02;
        const ASSOCIATED = 0x04;
        const EXTENDED_METADATA = 0x08;
        const EXTENDED_PERMISSIONS = 0x10;
        const RESERVED1 = 0x20;
        const RESERVED2 = 0x40;
        const MULTI_EXTENT = 0x80;
    }
}

/// Decoded file identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// The directory itself (`0x00`)
    Current,
    /// The parent directory (`0x01`)
    Parent,
    Name { name: String, version: u16 },
}

impl Identifier {
    /// Decode identifier bytes, splitting off the `;version` suffix
    pub fn parse(bytes: &[u8]) -> Self {
        match bytes {
            [0] => return Self::Current,
            [1] => return Self::Parent,
            _ => {}
        }

        let raw = String::from_utf8_lossy(bytes);
        let (name, version) = match raw.rsplit_once(';') {
            Some((name, version)) => (name, version.trim().parse().unwrap_or(1)),
            None => (&raw[..], 1),
        };

        // "README.;1" names a file without extension
        let name = match name.strip_suffix('.') {
            Some(stripped) if !stripped.is_empty() => stripped,
            _ => name,
        };

        Self::Name {
            name: name.to_string(),
            version,
        }
    }
}

/// A parsed directory record
#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    pub length: u8,
    pub extended_attribute_length: u8,
    pub extent_lba: u32,
    pub data_length: u32,
    pub recorded_at: Option<DateTime<FixedOffset>>,
    pub flags: FileFlags,
    pub interleave_unit_size: u8,
    pub interleave_gap: u8,
    pub volume_sequence_number: u16,
    pub identifier: Identifier,
}

impl DirectoryRecord {
    /// Parse the record at the start of `data`.
    ///
    /// `data` must not extend past the sector the record lives in. With
    /// `strict`, disagreeing little- and big-endian copies of a field are an
    /// error; otherwise the little-endian copy wins.
    pub fn parse(data: &[u8], strict: bool) -> Result<Self, String> {
        if data.len() < FIXED_LENGTH {
            return Err(format!("only {} bytes left for a record", data.len()));
        }

        let length = data[0];
        if (length as usize) < DIRECTORY_RECORD_MIN_LENGTH {
            return Err(format!("record length {} is below the minimum", length));
        }
        if length as usize > data.len() {
            return Err(format!(
                "record length {} runs past the end of the sector ({} bytes left)",
                length,
                data.len()
            ));
        }

        let identifier_length = data[32] as usize;
        if identifier_length == 0 {
            return Err("empty file identifier".to_string());
        }
        if FIXED_LENGTH + identifier_length > length as usize {
            return Err(format!(
                "identifier of {} bytes does not fit in a {} byte record",
                identifier_length, length
            ));
        }

        let extent_lba = both_endian_u32(&data[2..10], "extent location", strict)?;
        let data_length = both_endian_u32(&data[10..18], "data length", strict)?;

        Ok(Self {
            length,
            extended_attribute_length: data[1],
            extent_lba,
            data_length,
            recorded_at: parse_binary_timestamp(&data[18..25]),
            flags: FileFlags::from_bits_retain(data[25]),
            interleave_unit_size: data[26],
            interleave_gap: data[27],
            volume_sequence_number: LittleEndian::read_u16(&data[28..30]),
            identifier: Identifier::parse(&data[FIXED_LENGTH..FIXED_LENGTH + identifier_length]),
        })
    }

    pub fn is_directory(&self) -> bool {
        self.flags.contains(FileFlags::DIRECTORY)
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.contains(FileFlags::HIDDEN)
    }

    /// Byte range of the record's data in logical-offset space. The extended
    /// attribute record, if any, precedes the data in the extent.
    pub fn data_range(&self, block_size: u64) -> Option<Range<u64>> {
        let start_block = u64::from(self.extent_lba) + u64::from(self.extended_attribute_length);
        let start = start_block.checked_mul(block_size)?;
        Some(start..start + u64::from(self.data_length))
    }
}

fn both_endian_u32(field: &[u8], what: &str, strict: bool) -> Result<u32, String> {
    let le = LittleEndian::read_u32(&field[0..4]);
    let be = BigEndian::read_u32(&field[4..8]);
    if le != be {
        if strict {
            return Err(format!("{} copies disagree ({} / {})", what, le, be));
        }
        log::warn!("Directory record {} copies disagree ({} / {}), using {}", what, le, be, le);
    }
    Ok(le)
}

/// Parse every record in a directory extent.
///
/// `data` holds the extent's bytes, which start at logical offset
/// `base_offset`; `sector_size` is the logical block size. Zero bytes and
/// sector tails too short to hold a record are skipped. Errors carry the
/// logical offset of the offending record.
pub fn parse_directory_extent(
    data: &[u8],
    sector_size: usize,
    base_offset: u64,
    strict: bool,
) -> ImageResult<Vec<DirectoryRecord>> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let left_in_extent = data.len() - offset;
        let left_in_sector = (sector_size - offset % sector_size).min(left_in_extent);
        let next_sector = (offset / sector_size + 1) * sector_size;

        if data[offset] == 0 || left_in_sector < DIRECTORY_RECORD_MIN_LENGTH {
            if left_in_sector == left_in_extent && data[offset] != 0 {
                log::warn!(
                    "Ignoring truncated record at byte {} at the end of a directory",
                    base_offset + offset as u64
                );
            }
            offset = next_sector;
            continue;
        }

        let record = DirectoryRecord::parse(&data[offset..offset + left_in_sector], strict)
            .map_err(|reason| ImageError::MalformedRecord {
                offset: base_offset + offset as u64,
                reason,
            })?;
        offset += record.length as usize;
        records.push(record);
    }

    Ok(records)
}
