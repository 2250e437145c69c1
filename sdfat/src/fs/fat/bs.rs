//! Boot sector and partition table parsing.
//!
//! Everything is read by byte offset from a raw sector, so a garbage sector can
//! fail the mount but never cause undefined behavior.
use super::{Cluster, FatType, MountError, MountResult, SECTOR_SIZE, dirent::DIR_ENTRY_SIZE};
use crate::config::PartitionSelect;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use sdfat_core::{BlockDevice, static_assert};

/// Offset of the first partition entry in the MBR.
const PARTITION_TABLE: usize = 0x1BE;
const PARTITION_ENTRY_SIZE: usize = 16;
const SIGNATURE: usize = 0x1FE;

static_assert!(PARTITION_TABLE + 4 * PARTITION_ENTRY_SIZE == SIGNATURE);

#[inline]
fn u16_at(sector: &[u8; SECTOR_SIZE], offset: usize) -> u16 {
    u16::from_le_bytes([sector[offset], sector[offset + 1]])
}

#[inline]
fn u32_at(sector: &[u8; SECTOR_SIZE], offset: usize) -> u32 {
    u32::from_le_bytes([
        sector[offset],
        sector[offset + 1],
        sector[offset + 2],
        sector[offset + 3],
    ])
}

#[inline]
fn has_signature(sector: &[u8; SECTOR_SIZE]) -> bool {
    sector[SIGNATURE..] == [0x55, 0xAA]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
/// Partition type byte of an MBR entry.
pub enum PartitionType {
    Empty = 0x00,
    Fat12 = 0x01,
    Fat16Small = 0x04,
    Extended = 0x05,
    Fat16 = 0x06,
    Fat32Chs = 0x0B,
    Fat32Lba = 0x0C,
    Fat16Lba = 0x0E,
    ExtendedLba = 0x0F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One of the four primary MBR partition entries.
pub struct PartitionEntry {
    kind: u8,
    start: u32,
    size: u32,
}

impl PartitionEntry {
    #[must_use]
    pub fn parse(mbr: &[u8; SECTOR_SIZE], index: u8) -> Self {
        let base = PARTITION_TABLE + usize::from(index) * PARTITION_ENTRY_SIZE;
        Self {
            kind: mbr[base + 0x04],
            start: u32_at(mbr, base + 0x08),
            size: u32_at(mbr, base + 0x0C),
        }
    }

    #[must_use]
    #[inline]
    pub const fn kind(&self) -> u8 {
        self.kind
    }

    #[must_use]
    #[inline]
    pub const fn start(&self) -> u32 {
        self.start
    }

    #[must_use]
    #[inline]
    pub const fn size(&self) -> u32 {
        self.size
    }
}

/// View over a volume boot sector.
pub struct BootSector<'a>(&'a [u8; SECTOR_SIZE]);

impl<'a> BootSector<'a> {
    #[must_use]
    #[inline]
    pub const fn new(sector: &'a [u8; SECTOR_SIZE]) -> Self {
        Self(sector)
    }

    #[must_use]
    #[inline]
    pub fn bytes_per_sector(&self) -> u16 {
        u16_at(self.0, 0x0B)
    }

    #[must_use]
    #[inline]
    pub const fn sectors_per_cluster(&self) -> u8 {
        self.0[0x0D]
    }

    #[must_use]
    #[inline]
    pub fn reserved_sectors(&self) -> u16 {
        u16_at(self.0, 0x0E)
    }

    #[must_use]
    #[inline]
    pub const fn fat_count(&self) -> u8 {
        self.0[0x10]
    }

    #[must_use]
    #[inline]
    /// Returns the number of root directory entries, 0 on FAT32.
    pub fn root_entries(&self) -> u16 {
        u16_at(self.0, 0x11)
    }

    #[must_use]
    /// Returns the number of sectors in the volume.
    ///
    /// The 32-bit field is used when the 16-bit one is zero.
    pub fn total_sectors(&self) -> u32 {
        match u16_at(self.0, 0x13) {
            0 => u32_at(self.0, 0x20),
            small => u32::from(small),
        }
    }

    #[must_use]
    /// Returns the size of one FAT copy in sectors.
    pub fn fat_size(&self) -> u32 {
        match u16_at(self.0, 0x16) {
            0 => u32_at(self.0, 0x24),
            small => u32::from(small),
        }
    }

    #[must_use]
    #[inline]
    /// FAT32 only. Bit 7 disables mirroring, bits 0-3 select the active FAT.
    pub fn ext_flags(&self) -> u16 {
        u16_at(self.0, 0x28)
    }

    #[must_use]
    #[inline]
    /// FAT32 only.
    pub fn root_cluster(&self) -> u32 {
        u32_at(self.0, 0x2C)
    }

    /// Returns the serial number and label of the extended boot record, if present.
    fn volume_id(&self, fat_type: FatType) -> Option<(u32, [u8; 11])> {
        let base = match fat_type {
            FatType::Fat16 => 0x26,
            FatType::Fat32 => 0x42,
        };
        if !matches!(self.0[base], 0x28 | 0x29) {
            return None;
        }
        let serial = u32_at(self.0, base + 1);
        let mut label = [b' '; 11];
        if self.0[base] == 0x29 {
            label.copy_from_slice(&self.0[base + 5..base + 16]);
        }
        Some((serial, label))
    }

    #[must_use]
    /// Returns `true` if the sector starts with a jump and carries sane geometry.
    pub fn is_plausible(&self) -> bool {
        let jump = matches!(self.0[..3], [0xEB, _, 0x90] | [0xE9, _, _]);
        let bps = self.bytes_per_sector();
        let spc = self.sectors_per_cluster();
        jump
            && bps.is_power_of_two()
            && (512..=4096).contains(&bps)
            && spc.is_power_of_two()
            && self.reserved_sectors() != 0
            && self.fat_count() != 0
    }
}

/// Computed layout of a mounted volume, in 512-byte sectors.
///
/// Every LBA handed out already includes the partition start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    fat_type: FatType,
    partition_start: u32,
    sectors_per_cluster: u8,
    reserved_sectors: u16,
    fat_count: u8,
    fat_size: u32,
    total_sectors: u32,
    root_entries: u16,
    root_dir_sectors: u32,
    first_data_sector: u32,
    cluster_count: u32,
    /// FAT32 root directory chain start
    root_cluster: Option<Cluster>,
    active_fat: u8,
    mirrored: bool,
    serial: u32,
    label: [u8; 11],
}

impl Geometry {
    /// Reads the boot sector (through the MBR if needed) and derives the layout.
    pub(crate) fn read<D: BlockDevice>(
        device: &mut D,
        partition: PartitionSelect,
    ) -> MountResult<Self> {
        let mut sector = [0; SECTOR_SIZE];
        device.read(&mut sector, 0)?;

        let start = match partition {
            PartitionSelect::Raw => 0,
            PartitionSelect::Index(index) => partition_start(&sector, index)?,
            PartitionSelect::Auto if BootSector::new(&sector).is_plausible() => 0,
            PartitionSelect::Auto => partition_start(&sector, 0)?,
        };
        if start != 0 {
            device.read(&mut sector, start as usize)?;
        }

        Self::parse(&BootSector::new(&sector), start)
    }

    /// Validates the BPB and classifies the volume from its cluster count.
    pub fn parse(bs: &BootSector<'_>, partition_start: u32) -> MountResult<Self> {
        let bytes_per_sector = bs.bytes_per_sector();
        if usize::from(bytes_per_sector) != SECTOR_SIZE {
            return Err(
                if bytes_per_sector.is_power_of_two() && bytes_per_sector > 512 {
                    MountError::UnsupportedBlockSize
                } else {
                    MountError::Fat
                },
            );
        }

        let sectors_per_cluster = bs.sectors_per_cluster();
        let reserved_sectors = bs.reserved_sectors();
        let fat_count = bs.fat_count();
        let fat_size = bs.fat_size();
        let total_sectors = bs.total_sectors();
        let root_entries = bs.root_entries();
        if !sectors_per_cluster.is_power_of_two()
            || reserved_sectors == 0
            || fat_count == 0
            || fat_size == 0
            || total_sectors == 0
        {
            return Err(MountError::Fat);
        }

        #[allow(clippy::cast_possible_truncation)]
        let root_dir_sectors =
            (u32::from(root_entries) * DIR_ENTRY_SIZE as u32).div_ceil(SECTOR_SIZE as u32);
        let first_data_sector = u32::from(fat_count)
            .checked_mul(fat_size)
            .and_then(|fats| fats.checked_add(u32::from(reserved_sectors)))
            .and_then(|meta| meta.checked_add(root_dir_sectors))
            .filter(|&first| first < total_sectors)
            .ok_or(MountError::Fat)?;
        let cluster_count = (total_sectors - first_data_sector) / u32::from(sectors_per_cluster);
        let fat_type = FatType::from_cluster_count(cluster_count)?;

        let fat_capacity = u64::from(fat_size) * SECTOR_SIZE as u64 / u64::from(fat_type.entry_width());
        if fat_capacity < u64::from(cluster_count) + 2 {
            return Err(MountError::Fat);
        }

        let (root_cluster, active_fat, mirrored) = match fat_type {
            FatType::Fat16 => {
                if root_entries == 0 {
                    return Err(MountError::Fat);
                }
                (None, 0, true)
            }
            FatType::Fat32 => {
                let root = bs.root_cluster();
                if root_entries != 0 || !(2..=cluster_count + 1).contains(&root) {
                    return Err(MountError::Fat);
                }
                let flags = bs.ext_flags();
                #[allow(clippy::cast_possible_truncation)]
                let active = (flags & 0x0F) as u8;
                if flags & 0x80 != 0 && active < fat_count {
                    (Some(Cluster::new(root)), active, false)
                } else {
                    (Some(Cluster::new(root)), 0, true)
                }
            }
        };

        let (serial, label) = bs.volume_id(fat_type).unwrap_or((0, [b' '; 11]));

        Ok(Self {
            fat_type,
            partition_start,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            fat_size,
            total_sectors,
            root_entries,
            root_dir_sectors,
            first_data_sector,
            cluster_count,
            root_cluster,
            active_fat,
            mirrored,
            serial,
            label,
        })
    }

    #[must_use]
    #[inline]
    pub const fn fat_type(&self) -> FatType {
        self.fat_type
    }

    #[must_use]
    #[inline]
    pub const fn partition_start(&self) -> u32 {
        self.partition_start
    }

    #[must_use]
    #[inline]
    pub const fn sectors_per_cluster(&self) -> u8 {
        self.sectors_per_cluster
    }

    #[must_use]
    #[inline]
    pub const fn bytes_per_cluster(&self) -> u32 {
        self.sectors_per_cluster as u32 * SECTOR_SIZE as u32
    }

    #[must_use]
    #[inline]
    pub const fn reserved_sectors(&self) -> u16 {
        self.reserved_sectors
    }

    #[must_use]
    #[inline]
    pub const fn fat_count(&self) -> u8 {
        self.fat_count
    }

    #[must_use]
    #[inline]
    pub const fn fat_size(&self) -> u32 {
        self.fat_size
    }

    #[must_use]
    #[inline]
    pub const fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    #[must_use]
    #[inline]
    pub const fn root_entries(&self) -> u16 {
        self.root_entries
    }

    #[must_use]
    #[inline]
    pub const fn root_dir_sectors(&self) -> u32 {
        self.root_dir_sectors
    }

    #[must_use]
    #[inline]
    /// Relative to the partition start.
    pub const fn first_data_sector(&self) -> u32 {
        self.first_data_sector
    }

    #[must_use]
    #[inline]
    pub const fn cluster_count(&self) -> u32 {
        self.cluster_count
    }

    #[must_use]
    #[inline]
    /// Returns the highest valid cluster number.
    pub const fn max_cluster(&self) -> u32 {
        self.cluster_count + 1
    }

    #[must_use]
    #[inline]
    /// Returns the first cluster of the root directory, `None` for the fixed FAT16 root.
    pub const fn root_cluster(&self) -> Option<Cluster> {
        self.root_cluster
    }

    #[must_use]
    #[inline]
    /// Returns the FAT copy used for reads.
    pub const fn active_fat(&self) -> u8 {
        self.active_fat
    }

    #[must_use]
    #[inline]
    /// Returns `false` if the volume asks for only the active FAT to be written.
    pub const fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    #[must_use]
    #[inline]
    pub const fn serial(&self) -> u32 {
        self.serial
    }

    #[must_use]
    #[inline]
    /// Returns the label stored in the boot sector, space padded.
    pub const fn boot_label(&self) -> &[u8; 11] {
        &self.label
    }

    #[must_use]
    /// Returns the LBA and byte offset of `cluster`'s entry in FAT copy `copy`.
    pub const fn fat_location(&self, copy: u8, cluster: Cluster) -> (u32, usize) {
        let bytes = cluster.value() * self.fat_type.entry_width();
        let lba = self.partition_start
            + self.reserved_sectors as u32
            + copy as u32 * self.fat_size
            + bytes / SECTOR_SIZE as u32;
        (lba, (bytes % SECTOR_SIZE as u32) as usize)
    }

    #[must_use]
    /// Returns the LBA of the first sector of a data cluster.
    pub const fn cluster_lba(&self, cluster: Cluster) -> u32 {
        self.partition_start
            + self.first_data_sector
            + (cluster.value() - 2) * self.sectors_per_cluster as u32
    }

    #[must_use]
    /// Returns the LBA of the fixed FAT16 root directory region.
    pub const fn root_lba(&self) -> u32 {
        self.partition_start + self.first_data_sector - self.root_dir_sectors
    }
}

/// Returns the start of the partition in MBR slot `index`.
fn partition_start(mbr: &[u8; SECTOR_SIZE], index: u8) -> MountResult<u32> {
    if index > 3 || !has_signature(mbr) {
        return Err(MountError::NoPartition);
    }

    let entry = PartitionEntry::parse(mbr, index);
    let kind = PartitionType::try_from(entry.kind());
    if entry.kind() == 0 || entry.start() == 0 {
        return Err(MountError::NoPartition);
    }
    match kind {
        Ok(PartitionType::Extended | PartitionType::ExtendedLba) => {
            return Err(MountError::NoPartition);
        }
        Ok(kind) => log::debug!("Partition {index}: {kind:?} at {}", entry.start()),
        Err(_) => log::warn!(
            "Partition {index} has unknown type {:#04x}, probing it anyway",
            entry.kind()
        ),
    }
    Ok(entry.start())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bpb {
        total: u32,
        spc: u8,
        reserved: u16,
        fats: u8,
        root_entries: u16,
        fat_size: u32,
        fat32: bool,
    }

    impl Bpb {
        fn build(&self) -> [u8; SECTOR_SIZE] {
            let mut s = [0u8; SECTOR_SIZE];
            s[..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
            s[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
            s[0x0D] = self.spc;
            s[0x0E..0x10].copy_from_slice(&self.reserved.to_le_bytes());
            s[0x10] = self.fats;
            s[0x11..0x13].copy_from_slice(&self.root_entries.to_le_bytes());
            match u16::try_from(self.total) {
                Ok(small) => s[0x13..0x15].copy_from_slice(&small.to_le_bytes()),
                Err(_) => s[0x20..0x24].copy_from_slice(&self.total.to_le_bytes()),
            }
            s[0x15] = 0xF8;
            if self.fat32 {
                s[0x24..0x28].copy_from_slice(&self.fat_size.to_le_bytes());
                s[0x2C..0x30].copy_from_slice(&2u32.to_le_bytes());
                s[0x42] = 0x29;
                s[0x43..0x47].copy_from_slice(&0xCAFE_F00Du32.to_le_bytes());
                s[0x47..0x52].copy_from_slice(b"THIRTYTWO  ");
            } else {
                let size = u16::try_from(self.fat_size).unwrap();
                s[0x16..0x18].copy_from_slice(&size.to_le_bytes());
                s[0x26] = 0x29;
                s[0x27..0x2B].copy_from_slice(&0x1234_5678u32.to_le_bytes());
                s[0x2B..0x36].copy_from_slice(b"SIXTEEN    ");
            }
            s[0x1FE] = 0x55;
            s[0x1FF] = 0xAA;
            s
        }
    }

    /// FAT16 layout with 1 reserved sector, 1 FAT and a 32 sector root
    fn fat16_with_clusters(clusters: u32) -> Bpb {
        let fat_size = ((clusters + 2) * 2).div_ceil(512);
        Bpb {
            total: 1 + fat_size + 32 + clusters,
            spc: 1,
            reserved: 1,
            fats: 1,
            root_entries: 512,
            fat_size,
            fat32: false,
        }
    }

    fn fat32_with_clusters(clusters: u32) -> Bpb {
        let fat_size = ((clusters + 2) * 4).div_ceil(512);
        Bpb {
            total: 32 + 2 * fat_size + clusters,
            spc: 1,
            reserved: 32,
            fats: 2,
            root_entries: 0,
            fat_size,
            fat32: true,
        }
    }

    #[test]
    fn test_classification_thresholds() {
        let sector = fat16_with_clusters(4084).build();
        assert_eq!(
            Geometry::parse(&BootSector::new(&sector), 0),
            Err(MountError::UnsupportedFs)
        );

        let sector = fat16_with_clusters(4085).build();
        let geometry = Geometry::parse(&BootSector::new(&sector), 0).unwrap();
        assert_eq!(geometry.fat_type(), FatType::Fat16);
        assert_eq!(geometry.cluster_count(), 4085);

        let sector = fat16_with_clusters(65524).build();
        let geometry = Geometry::parse(&BootSector::new(&sector), 0).unwrap();
        assert_eq!(geometry.fat_type(), FatType::Fat16);

        let sector = fat32_with_clusters(65525).build();
        let geometry = Geometry::parse(&BootSector::new(&sector), 0).unwrap();
        assert_eq!(geometry.fat_type(), FatType::Fat32);
        assert_eq!(geometry.root_cluster(), Some(Cluster::new(2)));
    }

    #[test]
    fn test_fat16_geometry() {
        let bpb = Bpb {
            total: 40000,
            spc: 8,
            reserved: 4,
            fats: 2,
            root_entries: 512,
            fat_size: 20,
            fat32: false,
        };
        let sector = bpb.build();
        let geometry = Geometry::parse(&BootSector::new(&sector), 100).unwrap();
        assert_eq!(geometry.root_dir_sectors(), 32);
        assert_eq!(geometry.first_data_sector(), 4 + 40 + 32);
        assert_eq!(geometry.cluster_count(), (40000 - 76) / 8);
        assert_eq!(geometry.bytes_per_cluster(), 4096);
        assert_eq!(geometry.root_lba(), 100 + 44);
        assert_eq!(geometry.cluster_lba(Cluster::new(2)), 100 + 76);
        assert_eq!(geometry.cluster_lba(Cluster::new(3)), 100 + 84);
        // 2 bytes per entry, 256 entries per sector
        assert_eq!(geometry.fat_location(0, Cluster::new(300)), (100 + 4 + 1, 88));
        assert_eq!(geometry.fat_location(1, Cluster::new(300)), (100 + 24 + 1, 88));
        assert_eq!(geometry.serial(), 0x1234_5678);
        assert_eq!(geometry.boot_label(), b"SIXTEEN    ");
    }

    #[test]
    fn test_fat32_ext_flags() {
        let mut sector = fat32_with_clusters(70000).build();
        sector[0x28] = 0x81;
        let geometry = Geometry::parse(&BootSector::new(&sector), 0).unwrap();
        assert_eq!(geometry.active_fat(), 1);
        assert!(!geometry.is_mirrored());
        assert_eq!(geometry.serial(), 0xCAFE_F00D);

        // 4 bytes per entry, 128 entries per sector
        let (lba, offset) = geometry.fat_location(1, Cluster::new(130));
        assert_eq!(lba, 32 + geometry.fat_size() + 1);
        assert_eq!(offset, 8);
    }

    #[test]
    fn test_invalid_geometry() {
        let mut sector = fat16_with_clusters(5000).build();
        sector[0x0D] = 0;
        assert_eq!(
            Geometry::parse(&BootSector::new(&sector), 0),
            Err(MountError::Fat)
        );

        let mut sector = fat16_with_clusters(5000).build();
        sector[0x0B..0x0D].copy_from_slice(&4096u16.to_le_bytes());
        assert_eq!(
            Geometry::parse(&BootSector::new(&sector), 0),
            Err(MountError::UnsupportedBlockSize)
        );

        let mut sector = fat16_with_clusters(5000).build();
        sector[0x0B..0x0D].copy_from_slice(&0u16.to_le_bytes());
        assert_eq!(
            Geometry::parse(&BootSector::new(&sector), 0),
            Err(MountError::Fat)
        );
    }

    #[test]
    fn test_partition_entry() {
        let mut mbr = [0u8; SECTOR_SIZE];
        assert_eq!(partition_start(&mbr, 0), Err(MountError::NoPartition));

        mbr[0x1FE] = 0x55;
        mbr[0x1FF] = 0xAA;
        assert_eq!(partition_start(&mbr, 0), Err(MountError::NoPartition));

        mbr[0x1C2] = u8::from(PartitionType::Fat16);
        mbr[0x1C6..0x1CA].copy_from_slice(&2048u32.to_le_bytes());
        mbr[0x1CA..0x1CE].copy_from_slice(&40000u32.to_le_bytes());
        assert_eq!(partition_start(&mbr, 0), Ok(2048));
        assert_eq!(PartitionEntry::parse(&mbr, 0).size(), 40000);
        assert_eq!(partition_start(&mbr, 1), Err(MountError::NoPartition));
        assert_eq!(partition_start(&mbr, 4), Err(MountError::NoPartition));

        // An MBR is not mistaken for a boot sector
        assert!(!BootSector::new(&mbr).is_plausible());
    }
}
