//! Mount-time configuration.

/// Which part of the device holds the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionSelect {
    /// Use sector 0 if it is a boot sector, else the first MBR partition.
    #[default]
    Auto,
    /// Use the given primary MBR slot (0 to 3).
    Index(u8),
    /// Sector 0 is the boot sector, the device is not partitioned.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountOptions {
    partition: PartitionSelect,
    max_path_len: usize,
    mirror_fats: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MountOptions {
    /// Longest accepted path: `MAX_PATH` minus drive, terminator and an 8.3 name.
    pub const DEFAULT_MAX_PATH_LEN: usize = 260 - 4 - 1 - 8;

    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            partition: PartitionSelect::Auto,
            max_path_len: Self::DEFAULT_MAX_PATH_LEN,
            mirror_fats: true,
        }
    }

    #[must_use]
    #[inline]
    pub const fn with_partition(mut self, partition: PartitionSelect) -> Self {
        self.partition = partition;
        self
    }

    #[must_use]
    #[inline]
    pub const fn with_max_path_len(mut self, max_path_len: usize) -> Self {
        self.max_path_len = max_path_len;
        self
    }

    #[must_use]
    #[inline]
    /// When disabled, only the active FAT is written.
    pub const fn with_mirror_fats(mut self, mirror_fats: bool) -> Self {
        self.mirror_fats = mirror_fats;
        self
    }

    #[must_use]
    #[inline]
    pub const fn partition(&self) -> PartitionSelect {
        self.partition
    }

    #[must_use]
    #[inline]
    pub const fn max_path_len(&self) -> usize {
        self.max_path_len
    }

    #[must_use]
    #[inline]
    pub const fn mirror_fats(&self) -> bool {
        self.mirror_fats
    }
}
