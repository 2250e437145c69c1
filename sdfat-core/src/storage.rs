use thiserror::Error;

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
/// Failure reported by a block transfer.
pub enum BlockDeviceError {
    #[error("I/O error")]
    Io,
    #[error("Out of bounds")]
    OutOfBounds,
    #[error("Unsupported operation")]
    Unsupported,
    #[error("Unaligned access")]
    UnalignedAccess,
    /// The medium asked to be retried later (busy card, missing token...).
    ///
    /// Callers of the filesystem never see a retry: the driver treats this
    /// like any other failure and reports it.
    #[error("Device not ready")]
    NotReady,
}

/// A medium read and written in whole blocks.
///
/// Typically an SD/MMC card or a disk image. Blocks are addressed by their
/// logical block address.
pub trait BlockDevice {
    const BLOCK_SIZE: usize;

    /// Bring the device up.
    ///
    /// This is called once at the beginning of mount. The default implementation
    /// assumes the device is always ready.
    ///
    /// ## Errors
    ///
    /// This function returns an error if the device could not be initialized.
    fn init(&mut self) -> Result<(), BlockDeviceError> {
        Ok(())
    }

    /// Fills `dst` with consecutive blocks, the first one being block `offset`.
    ///
    /// ## Errors
    ///
    /// Fails if the transfer fails, if it runs past the end of the medium, or
    /// if `dst.len()` is not a multiple of `Self::BLOCK_SIZE`.
    fn read(&mut self, dst: &mut [u8], offset: usize) -> Result<(), BlockDeviceError>;

    /// Stores `src` as consecutive blocks starting at block `offset`.
    ///
    /// The data must be on the medium once this returns `Ok`.
    ///
    /// ## Errors
    ///
    /// Same conditions as [`BlockDevice::read`].
    fn write(&mut self, src: &[u8], offset: usize) -> Result<(), BlockDeviceError>;
}

impl<T: BlockDevice> BlockDevice for &mut T {
    const BLOCK_SIZE: usize = T::BLOCK_SIZE;

    #[inline]
    fn init(&mut self) -> Result<(), BlockDeviceError> {
        (**self).init()
    }

    #[inline]
    fn read(&mut self, dst: &mut [u8], offset: usize) -> Result<(), BlockDeviceError> {
        (**self).read(dst, offset)
    }

    #[inline]
    fn write(&mut self, src: &[u8], offset: usize) -> Result<(), BlockDeviceError> {
        (**self).write(src, offset)
    }
}
