//! ISO 9660 volume descriptor parsing
//!
//! The volume descriptor set starts at sector 16 (offset 32768 bytes) and runs
//! until a set terminator. The Primary Volume Descriptor in it holds the volume
//! identification, the logical block size and the root directory record.

use std::io::SeekFrom;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};

use super::reader::{ImageError, ImageResult};
use crate::stream::ByteStream;

/// ISO 9660 sector size in bytes
pub const SECTOR_SIZE: u64 = 2048;

/// Sector number where the volume descriptor set starts
pub const PVD_SECTOR: u64 = 16;

/// Byte offset to the first volume descriptor
pub const PVD_OFFSET: u64 = PVD_SECTOR * SECTOR_SIZE;

/// Standard identifier for ISO 9660 volume descriptors
pub const ISO9660_IDENTIFIER: &[u8; 5] = b"CD001";

/// Offset and length of the root directory record in the PVD
pub(crate) const ROOT_RECORD_OFFSET: usize = 156;
const ROOT_RECORD_LENGTH: usize = 34;

/// Descriptors read before giving up on finding a terminator
const MAX_DESCRIPTORS: u64 = 64;

/// Type byte of a volume descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDescriptorType {
    BootRecord,
    Primary,
    Supplementary,
    Partition,
    SetTerminator,
    Unknown(u8),
}

impl From<u8> for VolumeDescriptorType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::BootRecord,
            1 => Self::Primary,
            2 => Self::Supplementary,
            3 => Self::Partition,
            255 => Self::SetTerminator,
            other => Self::Unknown(other),
        }
    }
}

/// Primary Volume Descriptor structure
#[derive(Debug, Clone)]
pub struct PrimaryVolumeDescriptor {
    /// System identifier (32 bytes)
    pub system_id: String,
    /// Volume identifier (32 bytes, space-padded)
    pub volume_id: String,
    /// Number of logical blocks in the volume
    pub volume_space_size: u32,
    /// Size of a logical block in bytes, normally 2048
    pub logical_block_size: u16,
    pub path_table_size: u32,
    /// LBA of the little-endian path table
    pub path_table_location: u32,
    /// Root directory record, verbatim
    pub root_directory_record: [u8; ROOT_RECORD_LENGTH],
    /// Volume set identifier (128 bytes)
    pub volume_set_id: String,
    /// Publisher identifier (128 bytes)
    pub publisher_id: String,
    /// Data preparer identifier (128 bytes)
    pub preparer_id: String,
    /// Application identifier (128 bytes)
    pub application_id: String,
    pub creation_date: Option<DateTime<FixedOffset>>,
    pub modification_date: Option<DateTime<FixedOffset>>,
}

impl PrimaryVolumeDescriptor {
    /// Parse a Primary Volume Descriptor from raw sector data
    pub fn parse(sector: &[u8]) -> Result<Self, String> {
        if sector.len() < SECTOR_SIZE as usize {
            return Err(format!(
                "Sector too small: {} bytes (expected {})",
                sector.len(),
                SECTOR_SIZE
            ));
        }

        if VolumeDescriptorType::from(sector[0]) != VolumeDescriptorType::Primary {
            return Err(format!("Not a Primary Volume Descriptor (type {})", sector[0]));
        }

        if &sector[1..6] != ISO9660_IDENTIFIER {
            return Err("Invalid ISO 9660 identifier (expected 'CD001')".to_string());
        }

        if sector[6] != 1 {
            return Err(format!("Unsupported PVD version: {}", sector[6]));
        }

        // Layout according to ECMA-119 8.4
        let logical_block_size = LittleEndian::read_u16(&sector[128..130]);
        if !logical_block_size.is_power_of_two() || !(512..=2048).contains(&logical_block_size) {
            return Err(format!("Invalid logical block size: {}", logical_block_size));
        }
        if BigEndian::read_u16(&sector[130..132]) != logical_block_size {
            log::warn!("PVD block size copies disagree, using little-endian value");
        }

        let mut root_directory_record = [0u8; ROOT_RECORD_LENGTH];
        root_directory_record
            .copy_from_slice(&sector[ROOT_RECORD_OFFSET..ROOT_RECORD_OFFSET + ROOT_RECORD_LENGTH]);

        Ok(Self {
            system_id: extract_string(&sector[8..40]),
            volume_id: extract_string(&sector[40..72]),
            volume_space_size: LittleEndian::read_u32(&sector[80..84]),
            logical_block_size,
            path_table_size: LittleEndian::read_u32(&sector[132..136]),
            path_table_location: LittleEndian::read_u32(&sector[140..144]),
            root_directory_record,
            volume_set_id: extract_string(&sector[190..318]),
            publisher_id: extract_string(&sector[318..446]),
            preparer_id: extract_string(&sector[446..574]),
            application_id: extract_string(&sector[574..702]),
            creation_date: parse_digit_timestamp(&sector[813..830]),
            modification_date: parse_digit_timestamp(&sector[830..847]),
        })
    }

    /// Scan the volume descriptor set of a logical (unpadded) volume stream
    /// and parse its Primary Volume Descriptor.
    pub fn read_from<S: ByteStream + ?Sized>(stream: &mut S) -> ImageResult<Self> {
        let mut sector = [0u8; SECTOR_SIZE as usize];

        for index in PVD_SECTOR..PVD_SECTOR + MAX_DESCRIPTORS {
            let offset = index * SECTOR_SIZE;
            stream.seek(SeekFrom::Start(offset))?;
            let n = stream.read_fully(&mut sector)?;
            if n < sector.len() {
                log::debug!("Volume descriptor set truncated at sector {}", index);
                break;
            }
            if &sector[1..6] != ISO9660_IDENTIFIER {
                log::debug!("Sector {} is not a volume descriptor", index);
                break;
            }

            match VolumeDescriptorType::from(sector[0]) {
                VolumeDescriptorType::Primary => {
                    return Self::parse(&sector)
                        .map_err(|reason| ImageError::MalformedRecord { offset, reason });
                }
                VolumeDescriptorType::SetTerminator => break,
                other => log::debug!("Skipping {:?} volume descriptor at sector {}", other, index),
            }
        }

        Err(ImageError::NoPrimaryVolumeDescriptor)
    }
}

/// Extract a string from a byte slice, trimming trailing spaces and nulls
fn extract_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

fn fixed_offset(quarter_hours: u8) -> Option<FixedOffset> {
    FixedOffset::east_opt(i32::from(quarter_hours as i8) * 15 * 60)
}

/// Parse the 7-byte recording date of a directory record: years since 1900,
/// month, day, hour, minute, second and GMT offset in 15 minute intervals.
/// An all-zero date means "not specified".
pub fn parse_binary_timestamp(bytes: &[u8]) -> Option<DateTime<FixedOffset>> {
    let bytes = bytes.get(..7)?;
    if bytes.iter().all(|&b| b == 0) {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(1900 + i32::from(bytes[0]), bytes[1].into(), bytes[2].into())?
        .and_hms_opt(bytes[3].into(), bytes[4].into(), bytes[5].into())?;
    fixed_offset(bytes[6])?.from_local_datetime(&date).single()
}

/// Parse a 17-byte volume descriptor date: "YYYYMMDDHHMMSScc" digits followed
/// by the GMT offset byte. All-zero digits mean "not specified".
pub fn parse_digit_timestamp(bytes: &[u8]) -> Option<DateTime<FixedOffset>> {
    let bytes = bytes.get(..17)?;
    let digits = std::str::from_utf8(&bytes[..16]).ok()?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) || digits.bytes().all(|b| b == b'0') {
        return None;
    }

    let field = |range: std::ops::Range<usize>| digits[range].parse::<u32>().ok();
    let date = NaiveDate::from_ymd_opt(field(0..4)? as i32, field(4..6)?, field(6..8)?)?
        .and_hms_milli_opt(field(8..10)?, field(10..12)?, field(12..14)?, field(14..16)? * 10)?;
    fixed_offset(bytes[16])?.from_local_datetime(&date).single()
}
