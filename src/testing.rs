//! Synthetic ISO 9660 images for tests
//!
//! Images have the Primary Volume Descriptor at sector 16, the set terminator
//! at 17 and directory extents from sector 18 on, followed by file data.
//! Every record is dated 2013-06-15 12:30:00 UTC.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::disc::LayoutKind;
use crate::stream::BlockLayout;

const SECTOR: usize = 2048;
const FIRST_DIRECTORY_LBA: u32 = 18;
pub const RECORD_DATE: [u8; 7] = [113, 6, 15, 12, 30, 0, 0];

struct FileSpec {
    identifier: String,
    data: Vec<u8>,
    hidden: bool,
}

struct DirSpec {
    name: String,
    parent: usize,
    dirs: Vec<usize>,
    files: Vec<FileSpec>,
}

enum Child<'a> {
    Dir(usize),
    File(&'a FileSpec, u32),
}

struct Allocation {
    dir_lbas: Vec<u32>,
    dir_sizes: Vec<u32>,
    file_lbas: Vec<Vec<u32>>,
    total_sectors: u32,
}

/// Builds a cooked (2048-byte sector) ISO 9660 image in memory
pub struct IsoBuilder {
    volume_id: String,
    dirs: Vec<DirSpec>,
}

impl IsoBuilder {
    pub fn new(volume_id: &str) -> Self {
        Self {
            volume_id: volume_id.to_string(),
            dirs: vec![DirSpec {
                name: String::new(),
                parent: 0,
                dirs: Vec::new(),
                files: Vec::new(),
            }],
        }
    }

    /// Add a file. Missing parent directories are created; a `;1` version is
    /// appended when the name has none.
    pub fn file(self, path: &str, data: &[u8]) -> Self {
        self.add_file(path, data, false)
    }

    pub fn hidden_file(self, path: &str, data: &[u8]) -> Self {
        self.add_file(path, data, true)
    }

    /// Add an (empty) directory
    pub fn dir(mut self, path: &str) -> Self {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        self.dir_index(&components);
        self
    }

    fn add_file(mut self, path: &str, data: &[u8], hidden: bool) -> Self {
        let mut components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let name = components.pop().expect("file path has a name");
        let dir = self.dir_index(&components);
        let identifier = if name.contains(';') {
            name.to_string()
        } else {
            format!("{};1", name)
        };
        self.dirs[dir].files.push(FileSpec {
            identifier,
            data: data.to_vec(),
            hidden,
        });
        self
    }

    fn dir_index(&mut self, components: &[&str]) -> usize {
        let mut current = 0;
        for component in components {
            let existing = self.dirs[current]
                .dirs
                .iter()
                .copied()
                .find(|&d| self.dirs[d].name == *component);
            current = match existing {
                Some(d) => d,
                None => {
                    let index = self.dirs.len();
                    self.dirs.push(DirSpec {
                        name: component.to_string(),
                        parent: current,
                        dirs: Vec::new(),
                        files: Vec::new(),
                    });
                    self.dirs[current].dirs.push(index);
                    index
                }
            };
        }
        current
    }

    /// LBA of the directory at `path`, as laid out by [`IsoBuilder::build`]
    pub fn directory_lba(&self, path: &str) -> u32 {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let mut current = 0;
        for component in components {
            current = self.dirs[current]
                .dirs
                .iter()
                .copied()
                .find(|&d| self.dirs[d].name == component)
                .expect("directory exists");
        }
        self.allocate().dir_lbas[current]
    }

    fn record_length(identifier_len: usize) -> usize {
        let len = 33 + identifier_len;
        len + len % 2
    }

    /// Children of a directory in identifier order, files with their index
    fn children(&self, dir: usize) -> Vec<(String, Child<'_>)> {
        let spec = &self.dirs[dir];
        let mut children: Vec<(String, Child<'_>)> = spec
            .dirs
            .iter()
            .map(|&d| (self.dirs[d].name.clone(), Child::Dir(d)))
            .chain(
                spec.files
                    .iter()
                    .enumerate()
                    .map(|(i, f)| (f.identifier.clone(), Child::File(f, i as u32))),
            )
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        children
    }

    /// Byte offsets of each record within a directory extent, packed so that no
    /// record crosses a sector boundary, and the extent size in sectors
    fn pack(lengths: &[usize]) -> (Vec<usize>, usize) {
        let mut offsets = Vec::with_capacity(lengths.len());
        let mut offset = 0;
        for &len in lengths {
            if offset % SECTOR + len > SECTOR {
                offset = (offset / SECTOR + 1) * SECTOR;
            }
            offsets.push(offset);
            offset += len;
        }
        (offsets, offset.div_ceil(SECTOR).max(1))
    }

    fn record_lengths(&self, dir: usize) -> Vec<usize> {
        let mut lengths = vec![34, 34];
        lengths.extend(
            self.children(dir)
                .iter()
                .map(|(name, _)| Self::record_length(name.len())),
        );
        lengths
    }

    fn allocate(&self) -> Allocation {
        let mut next = FIRST_DIRECTORY_LBA;
        let mut dir_lbas = Vec::new();
        let mut dir_sizes = Vec::new();
        for dir in 0..self.dirs.len() {
            let (_, sectors) = Self::pack(&self.record_lengths(dir));
            dir_lbas.push(next);
            dir_sizes.push((sectors * SECTOR) as u32);
            next += sectors as u32;
        }

        let mut file_lbas = Vec::new();
        for dir in &self.dirs {
            let mut lbas = Vec::new();
            for file in &dir.files {
                lbas.push(next);
                next += file.data.len().div_ceil(SECTOR).max(1) as u32;
            }
            file_lbas.push(lbas);
        }

        Allocation {
            dir_lbas,
            dir_sizes,
            file_lbas,
            total_sectors: next,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let alloc = self.allocate();
        let mut image = vec![0u8; alloc.total_sectors as usize * SECTOR];

        self.write_pvd(&mut image, &alloc);

        let terminator = &mut image[17 * SECTOR..18 * SECTOR];
        terminator[0] = 255;
        terminator[1..6].copy_from_slice(b"CD001");
        terminator[6] = 1;

        for dir in 0..self.dirs.len() {
            let start = alloc.dir_lbas[dir] as usize * SECTOR;
            let (offsets, _) = Self::pack(&self.record_lengths(dir));
            let parent = self.dirs[dir].parent;

            write_record(
                &mut image[start + offsets[0]..],
                alloc.dir_lbas[dir],
                alloc.dir_sizes[dir],
                0x02,
                &[0],
            );
            write_record(
                &mut image[start + offsets[1]..],
                alloc.dir_lbas[parent],
                alloc.dir_sizes[parent],
                0x02,
                &[1],
            );

            for ((name, child), offset) in self.children(dir).into_iter().zip(&offsets[2..]) {
                let record = &mut image[start + offset..];
                match child {
                    Child::Dir(d) => write_record(
                        record,
                        alloc.dir_lbas[d],
                        alloc.dir_sizes[d],
                        0x02,
                        name.as_bytes(),
                    ),
                    Child::File(file, i) => write_record(
                        record,
                        alloc.file_lbas[dir][i as usize],
                        file.data.len() as u32,
                        if file.hidden { 0x01 } else { 0x00 },
                        name.as_bytes(),
                    ),
                }
            }
        }

        for (dir, lbas) in self.dirs.iter().zip(&alloc.file_lbas) {
            for (file, &lba) in dir.files.iter().zip(lbas) {
                let start = lba as usize * SECTOR;
                image[start..start + file.data.len()].copy_from_slice(&file.data);
            }
        }

        image
    }

    fn write_pvd(&self, image: &mut [u8], alloc: &Allocation) {
        let pvd = &mut image[16 * SECTOR..17 * SECTOR];
        pvd[0] = 1;
        pvd[1..6].copy_from_slice(b"CD001");
        pvd[6] = 1;
        pvd[8..40].fill(b' ');
        pvd[40..72].fill(b' ');
        pvd[40..40 + self.volume_id.len()].copy_from_slice(self.volume_id.as_bytes());
        LittleEndian::write_u32(&mut pvd[80..84], alloc.total_sectors);
        BigEndian::write_u32(&mut pvd[84..88], alloc.total_sectors);
        LittleEndian::write_u16(&mut pvd[120..122], 1);
        BigEndian::write_u16(&mut pvd[122..124], 1);
        LittleEndian::write_u16(&mut pvd[124..126], 1);
        BigEndian::write_u16(&mut pvd[126..128], 1);
        LittleEndian::write_u16(&mut pvd[128..130], SECTOR as u16);
        BigEndian::write_u16(&mut pvd[130..132], SECTOR as u16);
        write_record(&mut pvd[156..190], alloc.dir_lbas[0], alloc.dir_sizes[0], 0x02, &[0]);
        pvd[190..702].fill(b' ');
        pvd[813..829].copy_from_slice(b"2013061512300000");
        pvd[830..846].copy_from_slice(b"2013061512300000");
        pvd[881] = 1;
    }
}

/// Write one directory record at the start of `out`
pub fn write_record(out: &mut [u8], lba: u32, size: u32, flags: u8, identifier: &[u8]) {
    let len = IsoBuilder::record_length(identifier.len());
    out[0] = len as u8;
    out[1] = 0;
    LittleEndian::write_u32(&mut out[2..6], lba);
    BigEndian::write_u32(&mut out[6..10], lba);
    LittleEndian::write_u32(&mut out[10..14], size);
    BigEndian::write_u32(&mut out[14..18], size);
    out[18..25].copy_from_slice(&RECORD_DATE);
    out[25] = flags;
    out[26] = 0;
    out[27] = 0;
    LittleEndian::write_u16(&mut out[28..30], 1);
    BigEndian::write_u16(&mut out[30..32], 1);
    out[32] = identifier.len() as u8;
    out[33..33 + identifier.len()].copy_from_slice(identifier);
}

/// Re-wrap a cooked image in padded raw sectors. Lead-in bytes are 0xFF and
/// lead-out bytes 0xEE so that stray reads of padding are easy to spot.
pub fn to_raw_layout(image: &[u8], layout: BlockLayout) -> Vec<u8> {
    let block = layout.block_size as usize;
    let mut raw = Vec::with_capacity(image.len() / block * layout.raw_block_size() as usize);
    for payload in image.chunks(block) {
        raw.extend(std::iter::repeat(0xFF).take(layout.lead_in as usize));
        raw.extend_from_slice(payload);
        raw.extend(std::iter::repeat(0).take(block - payload.len()));
        raw.extend(std::iter::repeat(0xEE).take(layout.lead_out as usize));
    }
    raw
}

/// Re-wrap a cooked image in 2352-byte Mode 1 sectors
pub fn to_raw_mode1(image: &[u8]) -> Vec<u8> {
    to_raw_layout(image, LayoutKind::Mode1.layout())
}
