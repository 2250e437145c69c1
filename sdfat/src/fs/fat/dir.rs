//! Directory navigation and entry management.
use super::{
    Cluster, FatError, FatFs, FatResult, SECTOR_SIZE,
    bs::Geometry,
    cache::SectorBuf,
    date::{Date, DateTime},
    dirent::{
        self, Attributes, DIR_ENTRY_SIZE, DirEntry, ENTRIES_PER_SECTOR, LongNameAssembler,
        LongNameEntry,
    },
    fat::FatEntries,
};
use crate::fs::{Path, PathBuf};
use alloc::{string::String, vec::Vec};
use sdfat_core::BlockDevice;

/// Where the entries of a directory begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStart {
    /// The root directory: a fixed region on FAT16, a chain on FAT32
    Root,
    /// A subdirectory chain
    Cluster(Cluster),
}

impl DirStart {
    /// Interprets the start cluster stored in a directory entry.
    ///
    /// A cluster outside the data region is a corrupted entry.
    fn from_entry(cluster: Cluster, geometry: &Geometry) -> FatResult<Self> {
        if cluster.is_free() || Some(cluster) == geometry.root_cluster() {
            Ok(Self::Root)
        } else if (2..=geometry.max_cluster()).contains(&cluster.value()) {
            Ok(Self::Cluster(cluster))
        } else {
            Err(FatError::Fat)
        }
    }

    /// Returns the cluster recorded in the `..` entry of a child.
    const fn dotdot_cluster(self) -> Cluster {
        match self {
            Self::Root => Cluster::FREE,
            Self::Cluster(cluster) => cluster,
        }
    }
}

/// Position of a short entry on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocation {
    lba: u32,
    offset: usize,
}

impl EntryLocation {
    #[must_use]
    #[inline]
    pub const fn lba(&self) -> u32 {
        self.lba
    }

    #[must_use]
    #[inline]
    /// Byte offset of the entry within its sector
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

/// A directory item as reported by enumeration and lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    name: String,
    entry: DirEntry,
    first_cluster: Cluster,
    location: EntryLocation,
    parent: DirStart,
    /// Slot index of the first long name fragment, or of the short entry
    first_slot: u32,
    /// Long name fragments plus the short entry
    slot_count: u8,
}

impl FileInfo {
    #[must_use]
    #[inline]
    /// Returns the long name if one is stored, else the 8.3 name.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn short_name(&self) -> String {
        self.entry.short_name()
    }

    #[must_use]
    #[inline]
    pub const fn has_long_name(&self) -> bool {
        self.slot_count > 1
    }

    #[must_use]
    #[inline]
    pub const fn attributes(&self) -> Attributes {
        self.entry.attributes()
    }

    #[must_use]
    #[inline]
    pub const fn is_dir(&self) -> bool {
        self.entry.attributes().is_directory()
    }

    #[must_use]
    #[inline]
    pub const fn is_file(&self) -> bool {
        !self.is_dir() && !self.entry.attributes().is_volume_id()
    }

    #[must_use]
    #[inline]
    pub const fn size(&self) -> u32 {
        self.entry.file_size()
    }

    #[must_use]
    #[inline]
    pub const fn first_cluster(&self) -> Cluster {
        self.first_cluster
    }

    #[must_use]
    #[inline]
    pub const fn created(&self) -> DateTime {
        self.entry.creation_datetime()
    }

    #[must_use]
    #[inline]
    pub const fn last_write(&self) -> DateTime {
        self.entry.last_write_datetime()
    }

    #[must_use]
    #[inline]
    pub const fn last_access(&self) -> Date {
        self.entry.last_access_date()
    }

    #[must_use]
    #[inline]
    pub const fn location(&self) -> EntryLocation {
        self.location
    }
}

#[derive(Debug, Clone, Copy)]
struct SlotPos {
    cluster: Cluster,
    sector: u32,
    slot: usize,
    index: u32,
}

/// Walks the 32-byte slots of one directory.
///
/// The fixed FAT16 root is addressed by sector; every other directory by
/// cluster chain, in which case `cluster` is never free.
#[derive(Debug)]
pub(crate) struct SlotCursor {
    start: DirStart,
    pos: SlotPos,
    at_end: bool,
    /// Value of the volume's write counter when `buffer` was filled
    generation: u32,
    buffer: SectorBuf,
}

impl SlotCursor {
    fn new(start: DirStart, geometry: &Geometry) -> Self {
        let mut cursor = Self {
            start,
            pos: SlotPos {
                cluster: Cluster::FREE,
                sector: 0,
                slot: 0,
                index: 0,
            },
            at_end: false,
            generation: 0,
            buffer: SectorBuf::new(),
        };
        cursor.rewind(geometry);
        cursor
    }

    fn rewind(&mut self, geometry: &Geometry) {
        let cluster = match self.start {
            DirStart::Root => geometry.root_cluster().unwrap_or(Cluster::FREE),
            DirStart::Cluster(cluster) => cluster,
        };
        self.restore(SlotPos {
            cluster,
            sector: 0,
            slot: 0,
            index: 0,
        });
    }

    const fn position(&self) -> SlotPos {
        self.pos
    }

    const fn restore(&mut self, pos: SlotPos) {
        self.pos = pos;
        self.at_end = false;
    }

    const fn is_fixed_root(&self) -> bool {
        self.pos.cluster.is_free()
    }

    const fn lba(&self, geometry: &Geometry) -> u32 {
        if self.is_fixed_root() {
            geometry.root_lba() + self.pos.sector
        } else {
            geometry.cluster_lba(self.pos.cluster) + self.pos.sector
        }
    }

    const fn location(&self, geometry: &Geometry) -> EntryLocation {
        EntryLocation {
            lba: self.lba(geometry),
            offset: self.pos.slot * DIR_ENTRY_SIZE,
        }
    }

    fn read<D: BlockDevice>(&mut self, fs: &mut FatFs<D>) -> FatResult<[u8; DIR_ENTRY_SIZE]> {
        if self.generation != fs.dir_writes {
            self.buffer.invalidate();
            self.generation = fs.dir_writes;
        }
        let lba = self.lba(&fs.geometry);
        self.buffer.load(&mut fs.device, lba)?;

        let mut raw = [0; DIR_ENTRY_SIZE];
        raw.copy_from_slice(&self.buffer.data()[self.pos.slot * DIR_ENTRY_SIZE..][..DIR_ENTRY_SIZE]);
        Ok(raw)
    }

    /// Overwrites the current slot, straight through to the device.
    fn write<D: BlockDevice>(
        &mut self,
        fs: &mut FatFs<D>,
        raw: &[u8; DIR_ENTRY_SIZE],
    ) -> FatResult<()> {
        self.read(fs)?;
        self.buffer.data_mut()[self.pos.slot * DIR_ENTRY_SIZE..][..DIR_ENTRY_SIZE]
            .copy_from_slice(raw);
        if let Err(err) = self.buffer.flush(&mut fs.device) {
            self.buffer.invalidate();
            return Err(err);
        }
        fs.dir_writes = fs.dir_writes.wrapping_add(1);
        self.generation = fs.dir_writes;
        Ok(())
    }

    /// Moves to the next slot.
    ///
    /// Returns `false` past the last slot. With `grow`, a subdirectory or a
    /// FAT32 root gets a fresh cluster instead.
    fn advance<D: BlockDevice>(&mut self, fs: &mut FatFs<D>, grow: bool) -> FatResult<bool> {
        if self.at_end {
            return Ok(false);
        }

        self.pos.index += 1;
        self.pos.slot += 1;
        if self.pos.slot == ENTRIES_PER_SECTOR {
            self.pos.slot = 0;
            self.pos.sector += 1;
        }

        if self.is_fixed_root() {
            self.at_end = self.pos.index >= u32::from(fs.geometry.root_entries());
            return Ok(!self.at_end);
        }
        if self.pos.slot != 0 || self.pos.sector < u32::from(fs.geometry.sectors_per_cluster()) {
            return Ok(true);
        }

        let current = self.pos.cluster;
        let next = match fs.table().next(current)? {
            Some(next) => next,
            None if grow => fs.grow_dir(current)?,
            None => {
                self.at_end = true;
                return Ok(false);
            }
        };
        self.pos.cluster = next;
        self.pos.sector = 0;
        Ok(true)
    }

    /// Positions the cursor on slot `index`.
    fn seek<D: BlockDevice>(&mut self, fs: &mut FatFs<D>, index: u32) -> FatResult<()> {
        self.rewind(&fs.geometry);
        while self.pos.index < index {
            if !self.advance(fs, false)? {
                return Err(FatError::Fat);
            }
        }
        Ok(())
    }
}

/// An open directory.
///
/// Items are handed out one at a time by [`FatFs::find_next`] and friends.
#[derive(Debug)]
pub struct DirCursor {
    slots: SlotCursor,
    names: LongNameAssembler,
    path: PathBuf,
    by_index: bool,
    item_index: u16,
}

impl DirCursor {
    fn new(start: DirStart, path: PathBuf, geometry: &Geometry) -> Self {
        Self {
            slots: SlotCursor::new(start, geometry),
            names: LongNameAssembler::default(),
            path,
            by_index: false,
            item_index: 0,
        }
    }

    fn enter(&mut self, start: DirStart, path: PathBuf, geometry: &Geometry) {
        self.slots = SlotCursor::new(start, geometry);
        self.names.clear();
        self.path = path;
        self.by_index = false;
        self.item_index = 0;
    }

    #[must_use]
    #[inline]
    /// Returns the path of the directory, built from the names used to reach it.
    pub const fn path(&self) -> &PathBuf {
        &self.path
    }

    #[must_use]
    #[inline]
    /// Returns the 1-based index of the last item handed out, 0 before the first.
    pub const fn item_index(&self) -> u16 {
        self.item_index
    }

    #[must_use]
    #[inline]
    pub const fn start(&self) -> DirStart {
        self.slots.start
    }

    #[must_use]
    #[inline]
    pub const fn is_root(&self) -> bool {
        matches!(self.slots.start, DirStart::Root)
    }

    #[must_use]
    #[inline]
    /// Returns `true` if the directory was last entered by item index.
    pub const fn opened_by_index(&self) -> bool {
        self.by_index
    }
}

impl<D: BlockDevice> FatFs<D> {
    pub(crate) const fn check_path(&self, path: &str) -> FatResult<()> {
        if path.len() > self.options.max_path_len() {
            Err(FatError::PathTooLong)
        } else {
            Ok(())
        }
    }

    /// Reads slots up to the next short entry, folding in its long name.
    fn next_entry(
        &mut self,
        slots: &mut SlotCursor,
        names: &mut LongNameAssembler,
    ) -> FatResult<Option<FileInfo>> {
        names.clear();
        while !slots.at_end {
            let raw = slots.read(self)?;
            match raw[0] {
                DirEntry::END_OF_ENTRIES => {
                    slots.at_end = true;
                    return Ok(None);
                }
                DirEntry::DELETED_ENTRY => names.clear(),
                _ if Attributes::from_bits_retain(raw[11]).is_long_name() => {
                    names.push(LongNameEntry::from_bytes(&raw), slots.pos.index);
                }
                _ => {
                    let entry = DirEntry::from_bytes(&raw);
                    let index = slots.pos.index;
                    let (name, first_slot, fragments) = names
                        .take(entry.name_raw())
                        .unwrap_or_else(|| (entry.short_name(), index, 0));
                    let info = FileInfo {
                        name,
                        first_cluster: entry.first_cluster(self.geometry.fat_type()),
                        entry,
                        location: slots.location(&self.geometry),
                        parent: slots.start,
                        first_slot,
                        slot_count: fragments + 1,
                    };
                    slots.advance(self, false)?;
                    return Ok(Some(info));
                }
            }
            slots.advance(self, false)?;
        }
        Ok(None)
    }

    /// Like [`Self::next_entry`], skipping the volume label and dot entries.
    fn next_item(
        &mut self,
        slots: &mut SlotCursor,
        names: &mut LongNameAssembler,
    ) -> FatResult<Option<FileInfo>> {
        while let Some(info) = self.next_entry(slots, names)? {
            if !info.attributes().is_volume_id() && !info.entry.is_dot() {
                return Ok(Some(info));
            }
        }
        Ok(None)
    }

    /// Looks `name` up in a directory.
    ///
    /// The 8.3 form is compared first; a stored long name matches ignoring ASCII case.
    pub(crate) fn lookup(&mut self, start: DirStart, name: &str) -> FatResult<Option<FileInfo>> {
        let short = dirent::to_short_name(name);
        let mut slots = SlotCursor::new(start, &self.geometry);
        let mut names = LongNameAssembler::default();
        while let Some(info) = self.next_entry(&mut slots, &mut names)? {
            if info.attributes().is_volume_id() {
                continue;
            }
            if short.as_ref() == Some(info.entry.name_raw())
                || (info.has_long_name() && info.name.eq_ignore_ascii_case(name))
            {
                return Ok(Some(info));
            }
        }
        Ok(None)
    }

    /// Follows `path` from the root down to a directory.
    ///
    /// A missing intermediate component is `NoPath`; a missing last one is `missing`.
    fn resolve_dir(&mut self, path: &str, missing: FatError) -> FatResult<(DirStart, PathBuf)> {
        let mut start = DirStart::Root;
        let mut resolved = PathBuf::root();
        let mut components = Path::new(path).components().peekable();
        while let Some(component) = components.next() {
            if component == "." {
                continue;
            }
            let error = if components.peek().is_some() {
                FatError::NoPath
            } else {
                missing
            };
            let info = self.lookup(start, component)?.ok_or(error)?;
            if !info.is_dir() {
                return Err(FatError::NotADirectory);
            }
            start = DirStart::from_entry(info.first_cluster, &self.geometry)?;
            if component == ".." {
                resolved.pop();
            } else {
                resolved.push_component(info.name());
            }
        }
        Ok((start, resolved))
    }

    /// Resolves everything but the last component of `path`.
    fn resolve_parent<'p>(&mut self, path: &'p str) -> FatResult<(DirStart, &'p str)> {
        self.check_path(path)?;
        let (parent, name) = Path::new(path)
            .split_last()
            .ok_or(FatError::IncorrectEntry)?;
        if name == "." || name == ".." {
            return Err(FatError::IncorrectEntry);
        }
        let (start, _) = self.resolve_dir(parent.as_str(), FatError::NoPath)?;
        Ok((start, name))
    }

    /// Returns the entry found at `path`.
    ///
    /// The root directory has no entry and yields `IncorrectEntry`.
    pub fn stat(&mut self, path: &str) -> FatResult<FileInfo> {
        let (parent, name) = self.resolve_parent(path)?;
        self.lookup(parent, name)?.ok_or(FatError::NotFound)
    }

    /// Opens the directory at `path`; `""`, `"/"` and `"\\"` are the root.
    pub fn open_dir(&mut self, path: &str) -> FatResult<DirCursor> {
        self.check_path(path)?;
        let (start, resolved) = self.resolve_dir(path, FatError::NotFound)?;
        Ok(DirCursor::new(start, resolved, &self.geometry))
    }

    /// Returns the next item of `dir`, or `None` once every item was seen.
    pub fn find_next(&mut self, dir: &mut DirCursor) -> FatResult<Option<FileInfo>> {
        let item = self.next_item(&mut dir.slots, &mut dir.names)?;
        if item.is_some() {
            dir.item_index = dir.item_index.saturating_add(1);
        }
        Ok(item)
    }

    /// Moves `dir` back before its first item.
    pub fn rewind_dir(&self, dir: &mut DirCursor) {
        dir.slots.rewind(&self.geometry);
        dir.names.clear();
        dir.item_index = 0;
    }

    /// Returns the `index`-th item of `dir`, counting from 1.
    pub fn find_by_index(&mut self, dir: &mut DirCursor, index: u16) -> FatResult<FileInfo> {
        if index == 0 {
            return Err(FatError::IndexOutOfRange);
        }
        if index <= dir.item_index {
            self.rewind_dir(dir);
        }
        loop {
            let info = self.find_next(dir)?.ok_or(FatError::NotFound)?;
            if dir.item_index == index {
                return Ok(info);
            }
        }
    }

    /// Counts the items of `dir`, leaving it rewound.
    pub fn count_items(&mut self, dir: &mut DirCursor) -> FatResult<u16> {
        self.rewind_dir(dir);
        let mut count = 0u16;
        while self.find_next(dir)?.is_some() {
            count = count.saturating_add(1);
        }
        self.rewind_dir(dir);
        Ok(count)
    }

    /// Enters the `index`-th item of `dir`, which must be a directory.
    pub fn open_dir_by_index(&mut self, dir: &mut DirCursor, index: u16) -> FatResult<()> {
        let info = self.find_by_index(dir, index)?;
        if !info.is_dir() {
            return Err(FatError::NotADirectory);
        }
        let start = DirStart::from_entry(info.first_cluster, &self.geometry)?;
        let path = dir.path.join(info.name());
        dir.enter(start, path, &self.geometry);
        dir.by_index = true;
        Ok(())
    }

    /// Moves `dir` to its parent.
    pub fn dir_back(&mut self, dir: &mut DirCursor) -> FatResult<()> {
        if dir.is_root() {
            return Err(FatError::AtRoot);
        }
        // Every subdirectory starts with `.` and `..`
        let parent = self.lookup(dir.slots.start, "..")?.ok_or(FatError::Fat)?;
        let start = DirStart::from_entry(parent.first_cluster, &self.geometry)?;
        let mut path = dir.path.clone();
        path.pop();
        dir.enter(start, path, &self.geometry);
        Ok(())
    }

    /// Returns the volume label and serial number.
    ///
    /// The label entry of the root directory wins over the boot sector copy.
    pub fn label(&mut self) -> FatResult<(String, u32)> {
        let mut slots = SlotCursor::new(DirStart::Root, &self.geometry);
        let mut names = LongNameAssembler::default();
        let mut label = None;
        while let Some(info) = self.next_entry(&mut slots, &mut names)? {
            if info.attributes().is_volume_id() {
                label = Some(dirent::display_label(info.entry.name_raw()));
                break;
            }
        }

        let label = label.unwrap_or_else(|| dirent::display_label(self.geometry.boot_label()));
        let label = if label == "NO NAME" {
            String::new()
        } else {
            label
        };
        Ok((label, self.geometry.serial()))
    }

    /// Creates an empty file.
    pub fn make_file(&mut self, path: &str) -> FatResult<FileInfo> {
        let (parent, name) = self.resolve_parent(path)?;
        let info = self.create_entry(parent, name, Attributes::ARCHIVE, Cluster::FREE)?;
        log::debug!("Created file {path}");
        Ok(info)
    }

    /// Creates an empty directory.
    pub fn make_dir(&mut self, path: &str) -> FatResult<()> {
        let (parent, name) = self.resolve_parent(path)?;
        dirent::validate_long_name(name)?;
        if self.lookup(parent, name)?.is_some() {
            return Err(FatError::Exist);
        }

        let cluster = self.table().alloc_cluster(None)?;
        let result = self
            .init_dir_cluster(cluster, parent)
            .and_then(|()| self.create_entry(parent, name, Attributes::DIRECTORY, cluster));
        match result {
            Ok(_) => {
                log::debug!("Created directory {path} at cluster {}", cluster.value());
                Ok(())
            }
            Err(err) => {
                if self.table().free_cluster_chain(cluster).is_err() {
                    log::warn!("Could not release cluster {} of {path}", cluster.value());
                }
                Err(err)
            }
        }
    }

    /// Deletes a file or an empty directory.
    pub fn remove(&mut self, path: &str) -> FatResult<()> {
        let info = self.stat(path)?;
        if info.attributes().is_read_only() || info.attributes().is_volume_id() {
            return Err(FatError::Denied);
        }
        if info.is_dir() {
            let start = DirStart::from_entry(info.first_cluster, &self.geometry)?;
            if start == DirStart::Root || !self.is_empty_dir(start)? {
                return Err(FatError::Denied);
            }
        }

        // Entries go first: an interruption orphans the chain instead of
        // leaving an entry pointing at free clusters
        let mut slots = SlotCursor::new(info.parent, &self.geometry);
        slots.seek(self, info.first_slot)?;
        for n in 0..info.slot_count {
            if n > 0 && !slots.advance(self, false)? {
                return Err(FatError::Fat);
            }
            let mut raw = slots.read(self)?;
            raw[0] = DirEntry::DELETED_ENTRY;
            slots.write(self, &raw)?;
        }

        if self.table().in_range(info.first_cluster) {
            let freed = self.table().free_cluster_chain(info.first_cluster)?;
            log::debug!("Removed {path}, released {freed} cluster(s)");
        } else {
            log::debug!("Removed {path}");
        }
        Ok(())
    }

    fn is_empty_dir(&mut self, start: DirStart) -> FatResult<bool> {
        let mut slots = SlotCursor::new(start, &self.geometry);
        let mut names = LongNameAssembler::default();
        Ok(self.next_item(&mut slots, &mut names)?.is_none())
    }

    /// Writes a new entry, with long name fragments when `name` is not plain 8.3.
    fn create_entry(
        &mut self,
        parent: DirStart,
        name: &str,
        attributes: Attributes,
        cluster: Cluster,
    ) -> FatResult<FileInfo> {
        dirent::validate_long_name(name)?;
        let wanted = dirent::to_short_name(name);

        let mut taken = Vec::new();
        let mut slots = SlotCursor::new(parent, &self.geometry);
        let mut names = LongNameAssembler::default();
        while let Some(info) = self.next_entry(&mut slots, &mut names)? {
            if info.attributes().is_volume_id() {
                continue;
            }
            if wanted.as_ref() == Some(info.entry.name_raw())
                || info.name.eq_ignore_ascii_case(name)
            {
                return Err(FatError::Exist);
            }
            taken.push(*info.entry.name_raw());
        }

        let (short, fragments) = match wanted {
            Some(short) if dirent::fits_short_entry(name) => (short, Vec::new()),
            _ => {
                let alias = dirent::generate_alias(name, &taken)?;
                let checksum = dirent::calc_short_name_checksum(&alias);
                (alias, dirent::long_name_entries(name, checksum))
            }
        };

        #[allow(clippy::cast_possible_truncation)]
        let slot_count = fragments.len() as u8 + 1;
        let needed = u32::from(slot_count);
        let mut slots = self.find_free_run(parent, needed)?;
        let first_slot = slots.pos.index;
        for fragment in &fragments {
            slots.write(self, &fragment.to_bytes())?;
            if !slots.advance(self, false)? {
                return Err(FatError::Fat);
            }
        }

        let mut entry = DirEntry::new(short, attributes, self.now());
        entry.set_first_cluster(cluster, self.geometry.fat_type());
        slots.write(self, &entry.to_bytes())?;

        Ok(FileInfo {
            name: String::from(name),
            entry,
            first_cluster: cluster,
            location: slots.location(&self.geometry),
            parent,
            first_slot,
            slot_count,
        })
    }

    /// Finds `needed` consecutive unused slots, growing the directory if allowed.
    fn find_free_run(&mut self, parent: DirStart, needed: u32) -> FatResult<SlotCursor> {
        let mut slots = SlotCursor::new(parent, &self.geometry);
        let mut run_start = slots.position();
        let mut run = 0;
        loop {
            let raw = slots.read(self)?;
            if raw[0] == DirEntry::END_OF_ENTRIES || raw[0] == DirEntry::DELETED_ENTRY {
                if run == 0 {
                    run_start = slots.position();
                }
                run += 1;
                if run == needed {
                    slots.restore(run_start);
                    return Ok(slots);
                }
            } else {
                run = 0;
            }
            if !slots.advance(self, true)? {
                return Err(FatError::NoSpace);
            }
        }
    }

    /// Appends a zeroed cluster to the directory chain ending at `tail`.
    fn grow_dir(&mut self, tail: Cluster) -> FatResult<Cluster> {
        let cluster = self.table().find_free()?;
        self.init_cluster(cluster, &[0; SECTOR_SIZE])?;
        self.table().claim_cluster(cluster, Some(tail))?;
        log::debug!("Extended directory with cluster {}", cluster.value());
        Ok(cluster)
    }

    /// Writes `head` to the first sector of `cluster` and zeroes the rest.
    fn init_cluster(&mut self, cluster: Cluster, head: &[u8; SECTOR_SIZE]) -> FatResult<()> {
        let lba = self.geometry.cluster_lba(cluster);
        self.device.write(head, lba as usize)?;
        let zero = [0; SECTOR_SIZE];
        for sector in 1..u32::from(self.geometry.sectors_per_cluster()) {
            self.device.write(&zero, (lba + sector) as usize)?;
        }
        self.dir_writes = self.dir_writes.wrapping_add(1);
        Ok(())
    }

    fn init_dir_cluster(&mut self, cluster: Cluster, parent: DirStart) -> FatResult<()> {
        let fat_type = self.geometry.fat_type();
        let now = self.now();

        let mut dot = DirEntry::new(DirEntry::DOT_ENTRY, Attributes::DIRECTORY, now);
        dot.set_first_cluster(cluster, fat_type);
        let mut dotdot = DirEntry::new(DirEntry::DOTDOT_ENTRY, Attributes::DIRECTORY, now);
        dotdot.set_first_cluster(parent.dotdot_cluster(), fat_type);

        let mut head = [0; SECTOR_SIZE];
        head[..DIR_ENTRY_SIZE].copy_from_slice(&dot.to_bytes());
        head[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE].copy_from_slice(&dotdot.to_bytes());
        self.init_cluster(cluster, &head)
    }

    /// Rewrites the short entry at `location` through `update`.
    pub(crate) fn update_entry(
        &mut self,
        location: EntryLocation,
        update: impl FnOnce(&mut DirEntry),
    ) -> FatResult<()> {
        let range = location.offset..location.offset + DIR_ENTRY_SIZE;
        let mut sector = SectorBuf::new();
        sector.load(&mut self.device, location.lba)?;

        let mut raw = [0; DIR_ENTRY_SIZE];
        raw.copy_from_slice(&sector.data()[range.clone()]);
        let mut entry = DirEntry::from_bytes(&raw);
        update(&mut entry);
        sector.data_mut()[range].copy_from_slice(&entry.to_bytes());

        sector.flush(&mut self.device)?;
        self.dir_writes = self.dir_writes.wrapping_add(1);
        Ok(())
    }
}
