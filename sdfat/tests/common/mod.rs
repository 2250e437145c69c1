//! Hand-built volume images shared by the integration tests.
#![allow(dead_code)]

use sdfat::{BlockDevice, BlockDeviceError, FatFs, MountOptions, RamDisk};
use std::{cell::Cell, rc::Rc};

pub const SECTOR: usize = 512;
pub const SERIAL: u32 = 0x1234_ABCD;
pub const LABEL: &[u8; 11] = b"SDFAT TEST ";

#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub total_sectors: u32,
    pub sectors_per_cluster: u8,
    pub reserved: u16,
    pub fat_count: u8,
    pub fat_size: u32,
    pub root_entries: u16,
    pub fat32: bool,
}

/// 4990 clusters of 4 KiB, 512 root entries.
pub const FAT16: Layout = Layout {
    total_sectors: 40_000,
    sectors_per_cluster: 8,
    reserved: 4,
    fat_count: 2,
    fat_size: 20,
    root_entries: 512,
    fat32: false,
};

/// 68874 clusters of one sector, root directory at cluster 2.
pub const FAT32: Layout = Layout {
    total_sectors: 70_000,
    sectors_per_cluster: 1,
    reserved: 32,
    fat_count: 2,
    fat_size: 547,
    root_entries: 0,
    fat32: true,
};

impl Layout {
    pub const fn root_dir_sectors(&self) -> u32 {
        (self.root_entries as u32 * 32).div_ceil(SECTOR as u32)
    }

    /// First sector of FAT copy `copy`, relative to the volume start.
    pub const fn fat_start(&self, copy: u8) -> u32 {
        self.reserved as u32 + copy as u32 * self.fat_size
    }

    pub const fn root_start(&self) -> u32 {
        self.fat_start(self.fat_count)
    }

    pub const fn data_start(&self) -> u32 {
        self.root_start() + self.root_dir_sectors()
    }

    pub const fn cluster_start(&self, cluster: u32) -> u32 {
        self.data_start() + (cluster - 2) * self.sectors_per_cluster as u32
    }

    pub const fn cluster_bytes(&self) -> usize {
        self.sectors_per_cluster as usize * SECTOR
    }

    pub fn boot_sector(&self, hidden: u32) -> [u8; SECTOR] {
        let mut bs = [0u8; SECTOR];
        bs[..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
        bs[3..11].copy_from_slice(b"SDFAT   ");
        bs[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        bs[0x0D] = self.sectors_per_cluster;
        bs[0x0E..0x10].copy_from_slice(&self.reserved.to_le_bytes());
        bs[0x10] = self.fat_count;
        bs[0x11..0x13].copy_from_slice(&self.root_entries.to_le_bytes());
        bs[0x15] = 0xF8;
        bs[0x18..0x1A].copy_from_slice(&63u16.to_le_bytes());
        bs[0x1A..0x1C].copy_from_slice(&255u16.to_le_bytes());
        bs[0x1C..0x20].copy_from_slice(&hidden.to_le_bytes());
        bs[0x20..0x24].copy_from_slice(&self.total_sectors.to_le_bytes());

        let ebr = if self.fat32 {
            bs[0x24..0x28].copy_from_slice(&self.fat_size.to_le_bytes());
            bs[0x2C..0x30].copy_from_slice(&2u32.to_le_bytes());
            bs[0x30..0x32].copy_from_slice(&1u16.to_le_bytes());
            bs[0x32..0x34].copy_from_slice(&6u16.to_le_bytes());
            0x40
        } else {
            let fat_size = u16::try_from(self.fat_size).unwrap();
            bs[0x16..0x18].copy_from_slice(&fat_size.to_le_bytes());
            0x24
        };
        bs[ebr] = 0x80;
        bs[ebr + 2] = 0x29;
        bs[ebr + 3..ebr + 7].copy_from_slice(&SERIAL.to_le_bytes());
        bs[ebr + 7..ebr + 18].copy_from_slice(LABEL);
        bs[ebr + 18..ebr + 26].copy_from_slice(if self.fat32 { b"FAT32   " } else { b"FAT16   " });
        bs[510] = 0x55;
        bs[511] = 0xAA;
        bs
    }

    /// Writes an empty file system into `volume`, which starts at LBA `hidden`.
    pub fn format_into(&self, volume: &mut [u8], hidden: u32) {
        volume[..SECTOR].copy_from_slice(&self.boot_sector(hidden));
        for copy in 0..self.fat_count {
            let start = self.fat_start(copy) as usize * SECTOR;
            if self.fat32 {
                volume[start..start + 4].copy_from_slice(&0x0FFF_FFF8u32.to_le_bytes());
                volume[start + 4..start + 8].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
                // Root directory
                volume[start + 8..start + 12].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
            } else {
                volume[start..start + 2].copy_from_slice(&0xFFF8u16.to_le_bytes());
                volume[start + 2..start + 4].copy_from_slice(&0xFFFFu16.to_le_bytes());
            }
        }
    }

    /// Returns a freshly formatted, unpartitioned disk.
    pub fn format(&self) -> RamDisk {
        let mut image = vec![0u8; self.total_sectors as usize * SECTOR];
        self.format_into(&mut image, 0);
        RamDisk::from_vec(image)
    }

    /// Returns a disk with an MBR whose first entry holds the volume at `start`.
    pub fn format_partitioned(&self, start: u32) -> RamDisk {
        let mut image = vec![0u8; (start + self.total_sectors) as usize * SECTOR];
        let entry = 0x1BE;
        image[entry + 4] = if self.fat32 { 0x0C } else { 0x06 };
        image[entry + 8..entry + 12].copy_from_slice(&start.to_le_bytes());
        image[entry + 12..entry + 16].copy_from_slice(&self.total_sectors.to_le_bytes());
        image[510] = 0x55;
        image[511] = 0xAA;
        self.format_into(&mut image[start as usize * SECTOR..], start);
        RamDisk::from_vec(image)
    }

    /// Reads the raw entry of `cluster` in FAT copy `copy` of an unpartitioned image.
    pub fn fat_entry(&self, image: &[u8], copy: u8, cluster: u32) -> u32 {
        let start = self.fat_start(copy) as usize * SECTOR;
        if self.fat32 {
            let at = start + cluster as usize * 4;
            u32::from_le_bytes(image[at..at + 4].try_into().unwrap())
        } else {
            let at = start + cluster as usize * 2;
            u32::from(u16::from_le_bytes(image[at..at + 2].try_into().unwrap()))
        }
    }

    /// Returns the bytes of FAT copy `copy` of an unpartitioned image.
    pub fn fat_copy<'a>(&self, image: &'a [u8], copy: u8) -> &'a [u8] {
        let start = self.fat_start(copy) as usize * SECTOR;
        &image[start..start + self.fat_size as usize * SECTOR]
    }
}

pub fn mount(disk: RamDisk) -> FatFs<RamDisk> {
    FatFs::mount(disk, MountOptions::new()).unwrap()
}

/// Deterministic, non-repeating-per-sector test data.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Writes `data` to a new file at `path` and closes it.
pub fn write_file<D: BlockDevice>(fs: &mut FatFs<D>, path: &str, data: &[u8]) {
    fs.make_file(path).unwrap();
    let mut file = fs.open(path).unwrap();
    assert_eq!(fs.write(&mut file, data).unwrap(), data.len());
    fs.close(file).unwrap();
}

/// Reads a whole file chunk by chunk.
pub fn read_file<D: BlockDevice>(fs: &mut FatFs<D>, path: &str) -> Vec<u8> {
    let mut file = fs.open(path).unwrap();
    let mut data = Vec::new();
    loop {
        let chunk = fs.read(&mut file).unwrap();
        if chunk.is_empty() {
            break;
        }
        data.extend_from_slice(chunk);
    }
    data
}

/// A disk whose transfers can be made to fail on demand.
pub struct FlakyDisk {
    disk: RamDisk,
    failing: Rc<Cell<bool>>,
}

impl FlakyDisk {
    pub fn new(disk: RamDisk) -> (Self, Rc<Cell<bool>>) {
        let failing = Rc::new(Cell::new(false));
        (
            Self {
                disk,
                failing: Rc::clone(&failing),
            },
            failing,
        )
    }
}

impl BlockDevice for FlakyDisk {
    const BLOCK_SIZE: usize = 512;

    fn read(&mut self, dst: &mut [u8], offset: usize) -> Result<(), BlockDeviceError> {
        if self.failing.get() {
            return Err(BlockDeviceError::Io);
        }
        self.disk.read(dst, offset)
    }

    fn write(&mut self, src: &[u8], offset: usize) -> Result<(), BlockDeviceError> {
        if self.failing.get() {
            return Err(BlockDeviceError::Io);
        }
        self.disk.write(src, offset)
    }
}
