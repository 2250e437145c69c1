//! File Allocation Table (FAT) file system implementation.
use super::{FileError, FileMetadata, FileResult, FileSystem, FileType, Path, PathBuf};
use crate::config::MountOptions;
use alloc::{boxed::Box, vec::Vec};
use sdfat_core::{BlockDevice, BlockDeviceError};
use thiserror::Error;

pub mod bs;
pub mod cache;
pub mod date;
pub mod dir;
pub mod dirent;
#[expect(clippy::module_inception, reason = "FS is named after this table")]
pub mod fat;
pub mod file;

use bs::Geometry;
use date::{DateTime, DosMinTimeProvider, TimeProvider};
use fat::{FatEntries, FatState, FatTable};

/// The only sector size the driver handles.
pub const SECTOR_SIZE: usize = 512;

/// Fat types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    Fat16,
    Fat32,
}

impl FatType {
    /// Volumes with fewer clusters are FAT12.
    pub const MIN_FAT16_CLUSTERS: u32 = 4085;
    /// Volumes with at least this many clusters are FAT32.
    pub const MIN_FAT32_CLUSTERS: u32 = 65525;

    /// Classifies a volume from its cluster count.
    ///
    /// This is the only valid way to tell the variants apart; the type string of
    /// the boot sector is informative only.
    pub const fn from_cluster_count(count: u32) -> MountResult<Self> {
        if count < Self::MIN_FAT16_CLUSTERS {
            Err(MountError::UnsupportedFs)
        } else if count < Self::MIN_FAT32_CLUSTERS {
            Ok(Self::Fat16)
        } else if count <= 0x0FFF_FFF5 {
            Ok(Self::Fat32)
        } else {
            Err(MountError::UnsupportedFs)
        }
    }

    #[must_use]
    #[inline]
    /// Returns the width of a table entry in bytes
    pub const fn entry_width(self) -> u32 {
        match self {
            Self::Fat16 => 2,
            Self::Fat32 => 4,
        }
    }

    #[must_use]
    #[inline]
    pub const fn entry_mask(self) -> u32 {
        match self {
            Self::Fat16 => 0xFFFF,
            Self::Fat32 => 0x0FFF_FFFF,
        }
    }

    #[must_use]
    #[inline]
    /// Returns the value written to terminate a chain
    pub const fn end_of_chain(self) -> u32 {
        self.entry_mask()
    }

    #[must_use]
    #[inline]
    pub const fn bad_cluster(self) -> u32 {
        self.entry_mask() - 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cluster(u32);

impl Cluster {
    /// Cluster number stored by files without data
    pub const FREE: Self = Self(0);

    #[must_use]
    #[inline]
    pub const fn new(cluster: u32) -> Self {
        Self(cluster)
    }

    #[must_use]
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }

    #[must_use]
    #[inline]
    pub const fn is_valid(&self, fat_type: FatType) -> bool {
        self.0 >= 2 && self.0 < fat_type.bad_cluster() - 7
    }

    #[must_use]
    #[inline]
    pub const fn is_end_of_chain(&self, fat_type: FatType) -> bool {
        self.0 > fat_type.bad_cluster() && self.0 <= fat_type.entry_mask()
    }

    #[must_use]
    #[inline]
    pub const fn is_bad(&self, fat_type: FatType) -> bool {
        self.0 == fat_type.bad_cluster()
    }

    #[must_use]
    #[inline]
    pub const fn is_free(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    #[inline]
    pub const fn is_reserved(&self, fat_type: FatType) -> bool {
        self.0 == 1 || (self.0 >= fat_type.bad_cluster() - 7 && self.0 < fat_type.bad_cluster())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
/// Error type for FAT filesystem operations
pub enum FatError {
    #[error("End of file")]
    Eof,
    #[error("Not found")]
    NotFound,
    #[error("Path not found")]
    NoPath,
    #[error("No space left on volume")]
    NoSpace,
    #[error("Entry already exists")]
    Exist,
    #[error("Invalid name")]
    IncorrectEntry,
    #[error("Access denied")]
    Denied,
    #[error("Path too long")]
    PathTooLong,
    #[error("Not a directory")]
    NotADirectory,
    #[error("Already at the root directory")]
    AtRoot,
    #[error("Index out of range")]
    IndexOutOfRange,
    #[error("Device error")]
    Device,
    #[error("Corrupted allocation table")]
    Fat,
}

impl FatError {
    #[must_use]
    #[inline]
    /// Returns `true` for failures that leave a stream in an unknown state.
    ///
    /// These latch the abort flag of the file that hit them.
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Device | Self::Fat | Self::Eof)
    }
}

impl From<BlockDeviceError> for FatError {
    #[inline]
    fn from(_: BlockDeviceError) -> Self {
        Self::Device
    }
}

pub type FatResult<T> = Result<T, FatError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
/// Error type for mounting a volume
pub enum MountError {
    #[error("Device initialization failed")]
    DeviceInitFail,
    #[error("Device error")]
    Device,
    #[error("No partition found")]
    NoPartition,
    #[error("Invalid boot sector")]
    Fat,
    #[error("Unsupported file system")]
    UnsupportedFs,
    #[error("Unsupported sector size")]
    UnsupportedBlockSize,
}

impl From<BlockDeviceError> for MountError {
    #[inline]
    fn from(_: BlockDeviceError) -> Self {
        Self::Device
    }
}

pub type MountResult<T> = Result<T, MountError>;

/// A mounted FAT16/FAT32 volume.
///
/// Files and directory cursors are separate handles carrying their own sector
/// buffer; every operation on them goes through the volume. Handles must be
/// synced before the volume is unmounted.
pub struct FatFs<D: BlockDevice> {
    device: D,
    geometry: Geometry,
    options: MountOptions,
    fat: FatState,
    /// Bumped on every directory sector write so cursors drop stale buffers
    dir_writes: u32,
    clock: Box<dyn TimeProvider>,
}

impl<D: BlockDevice> FatFs<D> {
    /// Mounts the volume found on `device`.
    ///
    /// ## Errors
    ///
    /// Fails if the device cannot be brought up or read, if no partition can be
    /// found, or if the boot sector does not describe a FAT16/FAT32 volume with
    /// 512-byte sectors.
    pub fn mount(mut device: D, options: MountOptions) -> MountResult<Self> {
        if D::BLOCK_SIZE != SECTOR_SIZE {
            return Err(MountError::UnsupportedBlockSize);
        }
        device.init().map_err(|_| MountError::DeviceInitFail)?;

        let geometry = Geometry::read(&mut device, options.partition())?;
        log::info!(
            "Mounted {:?} volume at LBA {}: {} clusters of {} bytes, {} FAT(s) of {} sectors",
            geometry.fat_type(),
            geometry.partition_start(),
            geometry.cluster_count(),
            geometry.bytes_per_cluster(),
            geometry.fat_count(),
            geometry.fat_size(),
        );

        Ok(Self {
            device,
            geometry,
            options,
            fat: FatState::default(),
            dir_writes: 0,
            clock: Box::new(DosMinTimeProvider::new()),
        })
    }

    #[must_use]
    /// Replaces the clock used to stamp entries.
    pub fn with_time_provider(mut self, provider: impl TimeProvider + 'static) -> Self {
        self.clock = Box::new(provider);
        self
    }

    #[must_use]
    /// Releases the device.
    pub fn unmount(self) -> D {
        self.device
    }

    #[must_use]
    #[inline]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[must_use]
    #[inline]
    pub const fn fat_type(&self) -> FatType {
        self.geometry.fat_type()
    }

    #[must_use]
    #[inline]
    pub const fn options(&self) -> &MountOptions {
        &self.options
    }

    #[must_use]
    /// Returns the size of the data region in bytes.
    pub fn capacity(&self) -> u64 {
        u64::from(self.geometry.cluster_count()) * u64::from(self.geometry.bytes_per_cluster())
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn capacity_kib(&self) -> f32 {
        self.capacity() as f32 / 1024.0
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn capacity_mib(&self) -> f32 {
        self.capacity() as f32 / (1024.0 * 1024.0)
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn capacity_gib(&self) -> f32 {
        self.capacity() as f32 / (1024.0 * 1024.0 * 1024.0)
    }

    /// Returns the number of free bytes.
    ///
    /// The table is scanned on first use only; allocations keep the count current.
    pub fn free_space(&mut self) -> FatResult<u64> {
        let free = self.table().count_free()?;
        Ok(u64::from(free) * u64::from(self.geometry.bytes_per_cluster()))
    }

    #[must_use]
    /// Gives access to the allocation table.
    pub fn table(&mut self) -> FatTable<'_, D> {
        let mirror = self.options.mirror_fats() && self.geometry.is_mirrored();
        FatTable::new(&mut self.device, &self.geometry, &mut self.fat, mirror)
    }

    #[must_use]
    #[inline]
    pub(crate) fn now(&self) -> DateTime {
        self.clock.get_current_date_time()
    }
}

impl<D: BlockDevice> FileSystem for FatFs<D> {
    fn create(&mut self, path: Path) -> FileResult<()> {
        self.make_file(path.as_str())?;
        Ok(())
    }

    fn delete(&mut self, path: Path) -> FileResult<()> {
        self.remove(path.as_str())?;
        Ok(())
    }

    fn exists(&mut self, path: Path) -> FileResult<bool> {
        if path.is_root() {
            return Ok(true);
        }
        match self.stat(path.as_str()) {
            Ok(_) => Ok(true),
            Err(FatError::NotFound | FatError::NoPath) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn open(&mut self, _path: Path) -> FileResult<()> {
        // No-op for FAT
        Ok(())
    }

    fn close(&mut self, _path: Path) -> FileResult<()> {
        // No-op for FAT
        Ok(())
    }

    fn read(&mut self, path: Path, buffer: &mut [u8], offset: usize) -> FileResult<usize> {
        let mut file = Self::open(self, path.as_str())?;
        let Ok(offset) = u32::try_from(offset) else {
            return Ok(0);
        };
        if offset >= file.size() {
            return Ok(0);
        }
        self.seek(&mut file, offset)?;
        Ok(self.read_into(&mut file, buffer)?)
    }

    fn write(&mut self, path: Path, buffer: &[u8], offset: usize) -> FileResult<usize> {
        let mut file = Self::open(self, path.as_str())?;
        let offset = u32::try_from(offset).map_err(|_| FileError::UnexpectedEof)?;
        if offset > file.size() {
            return Err(FileError::UnexpectedEof);
        }
        self.seek(&mut file, offset)?;
        let written = Self::write(self, &mut file, buffer)?;
        Self::close(self, file)?;
        Ok(written)
    }

    fn metadata(&mut self, path: Path) -> FileResult<FileMetadata> {
        if path.is_root() {
            return Ok(FileMetadata::new(0, FileType::Directory));
        }
        let info = self.stat(path.as_str())?;
        let file_type = if info.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        };
        Ok(FileMetadata::new(info.size() as usize, file_type))
    }

    fn read_dir(&mut self, path: Path) -> FileResult<Vec<PathBuf>> {
        let mut dir = self.open_dir(path.as_str())?;
        let mut entries = Vec::new();
        while let Some(info) = self.find_next(&mut dir)? {
            entries.push(dir.path().join(info.name()));
        }
        Ok(entries)
    }
}
