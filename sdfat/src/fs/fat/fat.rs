use super::{Cluster, FatError, FatResult, FatType, bs::Geometry, cache::SectorBuf};
use sdfat_core::BlockDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// FAT16/32 table entry
pub enum FatEntry {
    /// Free cluster
    Free,
    /// Used cluster, pointing to the next cluster in the chain
    Next(Cluster),
    /// Last cluster in the chain
    EndOfChain,
    /// Bad cluster
    Bad,
    /// Reserved cluster
    Reserved,
}

impl FatEntry {
    #[must_use]
    /// Interprets a raw table value, with the FAT32 top nibble already masked.
    pub const fn decode(raw: u32, fat_type: FatType) -> Self {
        let value = Cluster::new(raw);
        if value.is_free() {
            Self::Free
        } else if value.is_end_of_chain(fat_type) {
            Self::EndOfChain
        } else if value.is_bad(fat_type) {
            Self::Bad
        } else if value.is_reserved(fat_type) {
            Self::Reserved
        } else {
            Self::Next(value)
        }
    }

    #[must_use]
    pub const fn encode(self, fat_type: FatType) -> u32 {
        match self {
            Self::Free => 0,
            Self::Next(next) => next.value() & fat_type.entry_mask(),
            Self::EndOfChain => fat_type.end_of_chain(),
            Self::Bad => fat_type.bad_cluster(),
            Self::Reserved => fat_type.bad_cluster() - 1,
        }
    }
}

/// Collection of FAT entries
///
/// Implementors provide raw access to the table; the chain algorithms are
/// shared default methods.
pub trait FatEntries {
    #[must_use]
    /// Returns the type of FAT (FAT16, FAT32)
    fn fat_type(&self) -> FatType;

    #[must_use]
    /// Returns the highest cluster number backed by the data region
    fn max_cluster(&self) -> u32;

    /// Returns the entry value for the given cluster
    fn get(&mut self, cluster: Cluster) -> FatResult<FatEntry>;

    /// Sets the entry value for the given cluster
    fn set(&mut self, cluster: Cluster, entry: FatEntry) -> FatResult<()>;

    #[must_use]
    #[inline]
    /// Returns true if `cluster` addresses the data region
    fn in_range(&self, cluster: Cluster) -> bool {
        (2..=self.max_cluster()).contains(&cluster.value())
    }

    /// Follows one link of a chain.
    ///
    /// Returns `None` at the end of the chain. A link to a free, bad, reserved
    /// or out of range cluster is a corrupted chain.
    fn next(&mut self, cluster: Cluster) -> FatResult<Option<Cluster>> {
        match self.get(cluster)? {
            FatEntry::Next(next) if self.in_range(next) => Ok(Some(next)),
            FatEntry::EndOfChain => Ok(None),
            _ => Err(FatError::Fat),
        }
    }

    #[must_use]
    /// Returns an iterator over all clusters in a chain starting from the given cluster
    fn chain_iter(&mut self, start: Cluster) -> FatChainIter<'_, Self>
    where
        Self: Sized,
    {
        FatChainIter {
            fat: self,
            next: Some(start),
        }
    }

    /// Counts the number of free clusters
    fn count_free(&mut self) -> FatResult<u32> {
        let mut free = 0;
        for value in 2..=self.max_cluster() {
            if self.get(Cluster::new(value))? == FatEntry::Free {
                free += 1;
            }
        }
        Ok(free)
    }

    /// Returns the first free cluster, scanning up from cluster 2
    fn find_free(&mut self) -> FatResult<Cluster> {
        for value in 2..=self.max_cluster() {
            let cluster = Cluster::new(value);
            if self.get(cluster)? == FatEntry::Free {
                return Ok(cluster);
            }
        }
        Err(FatError::NoSpace)
    }

    /// Allocates a new cluster, appending it to the chain ending at `prev`
    ///
    /// The new cluster is marked as end of chain before the previous tail is
    /// linked to it, so an interruption can orphan a cluster but never make a
    /// chain loop or dangle.
    fn alloc_cluster(&mut self, prev: Option<Cluster>) -> FatResult<Cluster> {
        let cluster = self.find_free()?;
        self.claim_cluster(cluster, prev)?;
        Ok(cluster)
    }

    /// Marks the free `cluster` as the new tail of the chain ending at `prev`
    fn claim_cluster(&mut self, cluster: Cluster, prev: Option<Cluster>) -> FatResult<()> {
        self.set(cluster, FatEntry::EndOfChain)?;
        if let Some(prev) = prev {
            self.set(prev, FatEntry::Next(cluster))?;
        }
        log::debug!("Allocated cluster {} after {:?}", cluster.value(), prev.map(|c| c.value()));
        Ok(())
    }

    /// Allocates a chain of clusters and returns the first cluster number
    ///
    /// Fails with `NoSpace` before touching the table if the volume cannot hold
    /// the whole chain.
    fn alloc_cluster_chain(&mut self, count: u32, prev: Option<Cluster>) -> FatResult<Cluster> {
        if count == 0 {
            return Err(FatError::IndexOutOfRange);
        }
        if self.count_free()? < count {
            return Err(FatError::NoSpace);
        }

        let first = self.alloc_cluster(prev)?;
        let mut tail = first;
        for _ in 1..count {
            tail = self.alloc_cluster(Some(tail))?;
        }
        Ok(first)
    }

    /// Frees a chain of clusters starting from the given cluster
    ///
    /// Returns the number of clusters released.
    fn free_cluster_chain(&mut self, start: Cluster) -> FatResult<u32> {
        if !self.in_range(start) {
            return Err(FatError::Fat);
        }

        let mut freed = 0;
        let mut current = Some(start);
        while let Some(cluster) = current {
            current = self.next(cluster)?;
            self.set(cluster, FatEntry::Free)?;
            freed += 1;
        }
        Ok(freed)
    }
}

/// Iterator over a chain of clusters
pub struct FatChainIter<'a, T: FatEntries> {
    fat: &'a mut T,
    next: Option<Cluster>,
}

impl<T: FatEntries> Iterator for FatChainIter<'_, T> {
    type Item = FatResult<Cluster>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        match self.fat.next(current) {
            Ok(next) => {
                self.next = next;
                Some(Ok(current))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// FAT16 entry handling
pub(crate) mod fat16 {
    #[must_use]
    #[inline]
    pub fn read_fat_entry(sector: &[u8], offset: usize) -> u32 {
        u32::from(u16::from_le_bytes([sector[offset], sector[offset + 1]]))
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_fat_entry(sector: &mut [u8], offset: usize, value: u32) {
        sector[offset..offset + 2].copy_from_slice(&(value as u16).to_le_bytes());
    }
}

/// FAT32 entry handling
pub(crate) mod fat32 {
    const MASK: u32 = 0x0FFF_FFFF;

    #[must_use]
    #[inline]
    /// Reads an entry, masking the reserved top nibble.
    pub fn read_fat_entry(sector: &[u8], offset: usize) -> u32 {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&sector[offset..offset + 4]);
        u32::from_le_bytes(bytes) & MASK
    }

    #[inline]
    /// Writes an entry, keeping the reserved top nibble as found.
    pub fn write_fat_entry(sector: &mut [u8], offset: usize, value: u32) {
        let mut bytes = [0; 4];
        bytes.copy_from_slice(&sector[offset..offset + 4]);
        let old = u32::from_le_bytes(bytes);
        let new = (old & !MASK) | (value & MASK);
        sector[offset..offset + 4].copy_from_slice(&new.to_le_bytes());
    }
}

/// Per-volume table state kept across operations.
#[derive(Debug, Default)]
pub(crate) struct FatState {
    /// Read cache for one sector of the active FAT; writes go through to disk
    pub cache: SectorBuf,
    /// Known once counted
    pub free_count: Option<u32>,
}

/// The file allocation table of a mounted volume, read and written in place.
pub struct FatTable<'a, D: BlockDevice> {
    device: &'a mut D,
    geometry: &'a Geometry,
    state: &'a mut FatState,
    mirror: bool,
}

impl<'a, D: BlockDevice> FatTable<'a, D> {
    pub(crate) const fn new(
        device: &'a mut D,
        geometry: &'a Geometry,
        state: &'a mut FatState,
        mirror: bool,
    ) -> Self {
        Self {
            device,
            geometry,
            state,
            mirror,
        }
    }

    fn check(&self, cluster: Cluster) -> FatResult<()> {
        if self.in_range(cluster) {
            Ok(())
        } else {
            Err(FatError::Fat)
        }
    }

    /// Loads the sector of the active FAT holding `cluster`'s entry.
    fn load(&mut self, cluster: Cluster) -> FatResult<usize> {
        let (lba, offset) = self
            .geometry
            .fat_location(self.geometry.active_fat(), cluster);
        self.state.cache.load(self.device, lba)?;
        Ok(offset)
    }

    fn read_raw(&mut self, cluster: Cluster) -> FatResult<u32> {
        let offset = self.load(cluster)?;
        let sector = self.state.cache.data();
        Ok(match self.geometry.fat_type() {
            FatType::Fat16 => fat16::read_fat_entry(sector, offset),
            FatType::Fat32 => fat32::read_fat_entry(sector, offset),
        })
    }
}

impl<D: BlockDevice> FatEntries for FatTable<'_, D> {
    #[inline]
    fn fat_type(&self) -> FatType {
        self.geometry.fat_type()
    }

    #[inline]
    fn max_cluster(&self) -> u32 {
        self.geometry.max_cluster()
    }

    fn get(&mut self, cluster: Cluster) -> FatResult<FatEntry> {
        self.check(cluster)?;
        let raw = self.read_raw(cluster)?;
        Ok(FatEntry::decode(raw, self.fat_type()))
    }

    fn set(&mut self, cluster: Cluster, entry: FatEntry) -> FatResult<()> {
        self.check(cluster)?;
        let fat_type = self.fat_type();
        let offset = self.load(cluster)?;
        let sector = self.state.cache.data_mut();
        let old = match fat_type {
            FatType::Fat16 => {
                let old = fat16::read_fat_entry(sector, offset);
                fat16::write_fat_entry(sector, offset, entry.encode(fat_type));
                old
            }
            FatType::Fat32 => {
                let old = fat32::read_fat_entry(sector, offset);
                fat32::write_fat_entry(sector, offset, entry.encode(fat_type));
                old
            }
        };
        let old = FatEntry::decode(old, fat_type);

        let copies = if self.mirror {
            0..self.geometry.fat_count()
        } else {
            let active = self.geometry.active_fat();
            active..active + 1
        };
        for copy in copies {
            let (lba, _) = self.geometry.fat_location(copy, cluster);
            if let Err(err) = self.state.cache.write_copy(self.device, lba) {
                // The cached sector no longer matches every copy on disk
                self.state.cache.invalidate();
                return Err(err);
            }
        }
        self.state.cache.mark_clean();

        if let Some(free) = self.state.free_count.as_mut() {
            match (old == FatEntry::Free, entry == FatEntry::Free) {
                (true, false) => *free = free.saturating_sub(1),
                (false, true) => *free += 1,
                _ => {}
            }
        }
        Ok(())
    }

    fn count_free(&mut self) -> FatResult<u32> {
        if let Some(free) = self.state.free_count {
            return Ok(free);
        }

        let mut free = 0;
        for value in 2..=self.max_cluster() {
            if self.read_raw(Cluster::new(value))? == 0 {
                free += 1;
            }
        }
        log::debug!("Counted {free} free clusters");
        self.state.free_count = Some(free);
        Ok(free)
    }

    fn find_free(&mut self) -> FatResult<Cluster> {
        if self.state.free_count == Some(0) {
            return Err(FatError::NoSpace);
        }
        for value in 2..=self.max_cluster() {
            let cluster = Cluster::new(value);
            if self.read_raw(cluster)? == 0 {
                return Ok(cluster);
            }
        }
        Err(FatError::NoSpace)
    }
}
