//! A block device backed by memory, for tests and hosted tooling.
use crate::{BlockDevice, BlockDeviceError};
use alloc::{vec, vec::Vec};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RamDisk {
    data: Vec<u8>,
}

impl RamDisk {
    pub const SECTOR_SIZE: usize = 512;

    #[must_use]
    /// Creates a zeroed disk of `sectors` sectors.
    pub fn new(sectors: usize) -> Self {
        Self {
            data: vec![0; sectors * Self::SECTOR_SIZE],
        }
    }

    #[must_use]
    #[inline]
    /// Wraps an existing image; a trailing partial sector is unreachable.
    pub const fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    #[must_use]
    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    #[must_use]
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[must_use]
    #[inline]
    pub const fn sector_count(&self) -> usize {
        self.data.len() / Self::SECTOR_SIZE
    }

    fn range(&self, len: usize, offset: usize) -> Result<core::ops::Range<usize>, BlockDeviceError> {
        if len % Self::SECTOR_SIZE != 0 {
            return Err(BlockDeviceError::UnalignedAccess);
        }
        let start = offset
            .checked_mul(Self::SECTOR_SIZE)
            .ok_or(BlockDeviceError::OutOfBounds)?;
        let end = start.checked_add(len).ok_or(BlockDeviceError::OutOfBounds)?;
        if end > self.sector_count() * Self::SECTOR_SIZE {
            return Err(BlockDeviceError::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl BlockDevice for RamDisk {
    const BLOCK_SIZE: usize = Self::SECTOR_SIZE;

    fn read(&mut self, dst: &mut [u8], offset: usize) -> Result<(), BlockDeviceError> {
        let range = self.range(dst.len(), offset)?;
        dst.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write(&mut self, src: &[u8], offset: usize) -> Result<(), BlockDeviceError> {
        let range = self.range(src.len(), offset)?;
        self.data[range].copy_from_slice(src);
        Ok(())
    }
}
