use super::{FatResult, SECTOR_SIZE};
use sdfat_core::BlockDevice;

/// One sector worth of data along with the LBA it mirrors.
///
/// Every open handle owns one of these, so two handles never clobber each
/// other's data.
#[derive(Clone)]
pub struct SectorBuf {
    data: [u8; SECTOR_SIZE],
    lba: Option<u32>,
    dirty: bool,
}

impl Default for SectorBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for SectorBuf {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SectorBuf")
            .field("lba", &self.lba)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

impl SectorBuf {
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            data: [0; SECTOR_SIZE],
            lba: None,
            dirty: false,
        }
    }

    #[must_use]
    #[inline]
    pub const fn lba(&self) -> Option<u32> {
        self.lba
    }

    #[must_use]
    #[inline]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    #[inline]
    pub const fn data(&self) -> &[u8; SECTOR_SIZE] {
        &self.data
    }

    #[must_use]
    #[inline]
    /// Returns the data for modification, marking the buffer dirty.
    pub const fn data_mut(&mut self) -> &mut [u8; SECTOR_SIZE] {
        self.dirty = true;
        &mut self.data
    }

    /// Makes the buffer mirror `lba`, writing back pending changes first.
    pub fn load<D: BlockDevice>(&mut self, device: &mut D, lba: u32) -> FatResult<()> {
        if self.lba == Some(lba) {
            return Ok(());
        }
        self.flush(device)?;
        self.lba = None;
        device.read(&mut self.data, lba as usize)?;
        self.lba = Some(lba);
        Ok(())
    }

    /// Like [`Self::load`], but for a sector whose old content is meaningless.
    pub fn load_zeroed<D: BlockDevice>(&mut self, device: &mut D, lba: u32) -> FatResult<()> {
        if self.lba == Some(lba) {
            return Ok(());
        }
        self.flush(device)?;
        self.data.fill(0);
        self.lba = Some(lba);
        Ok(())
    }

    /// Writes the buffer back if it holds changes.
    ///
    /// On failure the buffer stays dirty so the write can be retried.
    pub fn flush<D: BlockDevice>(&mut self, device: &mut D) -> FatResult<()> {
        if let (true, Some(lba)) = (self.dirty, self.lba) {
            device.write(&self.data, lba as usize)?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Writes the buffer to `lba` without changing what it mirrors.
    pub fn write_copy<D: BlockDevice>(&self, device: &mut D, lba: u32) -> FatResult<()> {
        device.write(&self.data, lba as usize)?;
        Ok(())
    }

    #[inline]
    pub const fn mark_clean(&mut self) {
        self.dirty = false;
    }

    #[inline]
    /// Forgets the mirrored sector, dropping unwritten changes.
    pub const fn invalidate(&mut self) {
        self.lba = None;
        self.dirty = false;
    }
}
