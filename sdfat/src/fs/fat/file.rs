//! File streams.
//!
//! A [`FatFile`] carries its own sector buffer; data reaches the device when
//! the stream leaves a sector or on [`FatFs::sync`]. Size and start cluster
//! are written to the directory entry on sync only.
use super::{
    Cluster, FatError, FatFs, FatResult, SECTOR_SIZE,
    cache::SectorBuf,
    date::DateTime,
    dir::{DirCursor, EntryLocation, FileInfo},
    dirent::Attributes,
    fat::{FatEntries, FatEntry},
};
use crate::fs::Path;
use sdfat_core::BlockDevice;

/// An open file.
#[derive(Debug)]
pub struct FatFile {
    /// Latched by device and structure failures
    error: Option<FatError>,
    position: u32,
    size: u32,
    attributes: Attributes,
    last_write: DateTime,
    first_cluster: Cluster,
    /// Cluster holding the last accessed position, free if none was reached yet
    cluster: Cluster,
    /// Index of `cluster` in the chain
    cluster_index: u32,
    buffer: SectorBuf,
    location: EntryLocation,
    /// Size, start cluster or write stamp differ from the directory entry
    entry_dirty: bool,
    eof: bool,
}

impl FatFile {
    fn from_info(info: &FileInfo) -> FatResult<Self> {
        if !info.is_file() {
            return Err(FatError::Denied);
        }
        Ok(Self {
            error: None,
            position: 0,
            size: info.size(),
            attributes: info.attributes(),
            last_write: info.last_write(),
            first_cluster: info.first_cluster(),
            cluster: Cluster::FREE,
            cluster_index: 0,
            buffer: SectorBuf::new(),
            location: info.location(),
            entry_dirty: false,
            eof: false,
        })
    }

    const fn check(&self) -> FatResult<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn latch<T>(&mut self, result: FatResult<T>) -> FatResult<T> {
        if let Err(err) = result
            && err.is_fatal()
            && self.error.is_none()
        {
            log::error!("File stream aborted at byte {}: {err}", self.position);
            self.error = Some(err);
        }
        result
    }

    #[must_use]
    #[inline]
    pub const fn position(&self) -> u32 {
        self.position
    }

    #[must_use]
    #[inline]
    pub const fn size(&self) -> u32 {
        self.size
    }

    #[must_use]
    #[inline]
    /// Returns `true` once a read found nothing left.
    pub const fn eof(&self) -> bool {
        self.eof
    }

    #[must_use]
    #[inline]
    /// Returns the failure that aborted the stream, if any.
    pub const fn error(&self) -> Option<FatError> {
        self.error
    }

    #[inline]
    /// Accepts operations again after a failure.
    pub const fn clear_error(&mut self) {
        self.error = None;
    }

    #[must_use]
    #[inline]
    pub const fn attributes(&self) -> Attributes {
        self.attributes
    }

    #[must_use]
    #[inline]
    pub const fn is_read_only(&self) -> bool {
        self.attributes.is_read_only()
    }

    #[must_use]
    #[inline]
    pub const fn is_hidden(&self) -> bool {
        self.attributes.is_hidden()
    }

    #[must_use]
    #[inline]
    pub const fn is_system(&self) -> bool {
        self.attributes.is_system()
    }

    #[must_use]
    #[inline]
    pub const fn is_archive(&self) -> bool {
        self.attributes.is_archive()
    }

    #[must_use]
    #[inline]
    pub const fn last_write(&self) -> DateTime {
        self.last_write
    }

    #[must_use]
    #[inline]
    pub const fn first_cluster(&self) -> Cluster {
        self.first_cluster
    }
}

impl<D: BlockDevice> FatFs<D> {
    /// Opens the file at `path`.
    pub fn open(&mut self, path: &str) -> FatResult<FatFile> {
        if Path::new(path).is_root() {
            return Err(FatError::Denied);
        }
        let info = self.stat(path)?;
        FatFile::from_info(&info)
    }

    /// Opens the file called `name` in the directory of `dir`.
    pub fn open_file(&mut self, dir: &DirCursor, name: &str) -> FatResult<FatFile> {
        self.check_path(name)?;
        let info = self.lookup(dir.start(), name)?.ok_or(FatError::NotFound)?;
        FatFile::from_info(&info)
    }

    /// Opens the `index`-th item of `dir`, counting from 1.
    pub fn open_file_by_index(&mut self, dir: &mut DirCursor, index: u16) -> FatResult<FatFile> {
        let info = self.find_by_index(dir, index)?;
        FatFile::from_info(&info)
    }

    /// Returns the LBA of the sector holding the stream position.
    ///
    /// With `allocate`, missing clusters are appended to the chain.
    fn locate(&mut self, file: &mut FatFile, allocate: bool) -> FatResult<u32> {
        let bytes_per_cluster = self.geometry.bytes_per_cluster();
        let target = file.position / bytes_per_cluster;

        if file.first_cluster.is_free() {
            if !allocate {
                return Err(FatError::Fat);
            }
            let first = self.table().alloc_cluster(None)?;
            file.first_cluster = first;
            file.cluster = first;
            file.cluster_index = 0;
            file.entry_dirty = true;
        }
        if !self.table().in_range(file.first_cluster) {
            return Err(FatError::Fat);
        }
        if file.cluster.is_free() || target < file.cluster_index {
            file.cluster = file.first_cluster;
            file.cluster_index = 0;
        }

        while file.cluster_index < target {
            file.cluster = match self.table().next(file.cluster)? {
                Some(next) => next,
                None if allocate => self.table().alloc_cluster(Some(file.cluster))?,
                None => return Err(FatError::Eof),
            };
            file.cluster_index += 1;
        }

        let sector = (file.position % bytes_per_cluster) / SECTOR_SIZE as u32;
        Ok(self.geometry.cluster_lba(file.cluster) + sector)
    }

    /// Loads the sector at the stream position and returns the byte range
    /// available in it, at most `max` bytes long.
    fn read_chunk(&mut self, file: &mut FatFile, max: usize) -> FatResult<(usize, usize)> {
        file.check()?;
        if file.position >= file.size {
            file.eof = true;
            return Ok((0, 0));
        }

        let lba = self.locate(file, false);
        let lba = file.latch(lba)?;
        let loaded = file.buffer.load(&mut self.device, lba);
        file.latch(loaded)?;

        let offset = file.position as usize % SECTOR_SIZE;
        let len = (SECTOR_SIZE - offset)
            .min((file.size - file.position) as usize)
            .min(max);
        #[allow(clippy::cast_possible_truncation)]
        {
            file.position += len as u32;
        }
        Ok((offset, len))
    }

    /// Reads the next chunk of `file`, up to the end of the current sector.
    ///
    /// An empty chunk means the end of the file was reached, which also sets
    /// the EOF flag.
    pub fn read<'f>(&mut self, file: &'f mut FatFile) -> FatResult<&'f [u8]> {
        let (offset, len) = self.read_chunk(file, usize::MAX)?;
        Ok(&file.buffer.data()[offset..offset + len])
    }

    /// Fills `buf` from `file`, returning how many bytes were copied.
    pub fn read_into(&mut self, file: &mut FatFile, buf: &mut [u8]) -> FatResult<usize> {
        let mut total = 0;
        while total < buf.len() {
            let (offset, len) = self.read_chunk(file, buf.len() - total)?;
            if len == 0 {
                break;
            }
            buf[total..total + len].copy_from_slice(&file.buffer.data()[offset..offset + len]);
            total += len;
        }
        Ok(total)
    }

    /// Writes `data` at the stream position, growing the file as needed.
    ///
    /// If the volume fills up midway, the bytes written so far are reported;
    /// `NoSpace` is returned only when nothing could be written.
    pub fn write(&mut self, file: &mut FatFile, data: &[u8]) -> FatResult<usize> {
        file.check()?;
        if file.is_read_only() {
            return Err(FatError::Denied);
        }

        let mut written = 0;
        while written < data.len() {
            if file.position == u32::MAX {
                break;
            }
            let lba = match self.locate(file, true) {
                Ok(lba) => lba,
                Err(FatError::NoSpace) if written > 0 => break,
                Err(err) => return file.latch(Err(err)),
            };

            let offset = file.position as usize % SECTOR_SIZE;
            // Sectors past the end of the file hold nothing worth reading back
            let loaded = if offset == 0 && file.position >= file.size {
                file.buffer.load_zeroed(&mut self.device, lba)
            } else {
                file.buffer.load(&mut self.device, lba)
            };
            file.latch(loaded)?;

            let len = (SECTOR_SIZE - offset)
                .min(data.len() - written)
                .min((u32::MAX - file.position) as usize);
            file.buffer.data_mut()[offset..offset + len]
                .copy_from_slice(&data[written..written + len]);
            written += len;
            #[allow(clippy::cast_possible_truncation)]
            {
                file.position += len as u32;
            }
            file.size = file.size.max(file.position);
            file.entry_dirty = true;
        }

        if written == 0 && !data.is_empty() {
            return Err(FatError::NoSpace);
        }
        Ok(written)
    }

    /// Returns a [`core::fmt::Write`] adaptor appending to `file`.
    pub const fn writer<'a>(&'a mut self, file: &'a mut FatFile) -> FileWriter<'a, D> {
        FileWriter { fs: self, file }
    }

    /// Moves the stream position; `position` may not exceed the file size.
    pub fn seek(&mut self, file: &mut FatFile, position: u32) -> FatResult<()> {
        file.check()?;
        if position > file.size {
            return Err(FatError::IndexOutOfRange);
        }
        file.position = position;
        file.eof = false;
        if position < file.size {
            let located = self.locate(file, false).map(|_| ());
            file.latch(located)?;
        }
        Ok(())
    }

    pub fn seek_end(&mut self, file: &mut FatFile) -> FatResult<()> {
        let size = file.size;
        self.seek(file, size)
    }

    /// Cuts `file` at the stream position, releasing the clusters past it.
    pub fn truncate(&mut self, file: &mut FatFile) -> FatResult<()> {
        file.check()?;
        if file.is_read_only() {
            return Err(FatError::Denied);
        }
        let cut = self.cut_chain(file);
        file.latch(cut)?;
        file.size = file.position;
        file.entry_dirty = true;
        Ok(())
    }

    fn cut_chain(&mut self, file: &mut FatFile) -> FatResult<()> {
        if file.first_cluster.is_free() {
            return Ok(());
        }
        if !self.table().in_range(file.first_cluster) {
            return Err(FatError::Fat);
        }

        // Pending data goes out while its cluster is still owned by the file
        file.buffer.flush(&mut self.device)?;
        file.buffer.invalidate();

        let keep = file.position.div_ceil(self.geometry.bytes_per_cluster());
        if keep == 0 {
            let freed = self.table().free_cluster_chain(file.first_cluster)?;
            log::debug!("Truncated file to nothing, released {freed} cluster(s)");
            file.first_cluster = Cluster::FREE;
            file.cluster = Cluster::FREE;
            file.cluster_index = 0;
            return Ok(());
        }

        let mut tail = file.first_cluster;
        for _ in 1..keep {
            tail = self.table().next(tail)?.ok_or(FatError::Eof)?;
        }
        if let Some(rest) = self.table().next(tail)? {
            self.table().set(tail, FatEntry::EndOfChain)?;
            let freed = self.table().free_cluster_chain(rest)?;
            log::debug!(
                "Truncated chain after cluster {}, released {freed} cluster(s)",
                tail.value()
            );
        }

        if file.cluster_index >= keep {
            file.cluster = Cluster::FREE;
            file.cluster_index = 0;
        }
        Ok(())
    }

    /// Records size and start cluster in the directory entry, then writes
    /// the pending sector.
    pub fn sync(&mut self, file: &mut FatFile) -> FatResult<()> {
        file.check()?;
        let synced = self.sync_inner(file);
        file.latch(synced)
    }

    fn sync_inner(&mut self, file: &mut FatFile) -> FatResult<()> {
        if file.entry_dirty {
            let now = self.now();
            let fat_type = self.geometry.fat_type();
            let (size, first_cluster) = (file.size, file.first_cluster);
            self.update_entry(file.location, |entry| {
                entry.set_file_size(size);
                entry.set_first_cluster(first_cluster, fat_type);
                entry.touch(now);
                entry.set_attributes(entry.attributes() | Attributes::ARCHIVE);
            })?;
            file.last_write = now;
            file.attributes |= Attributes::ARCHIVE;
            file.entry_dirty = false;
        }
        file.buffer.flush(&mut self.device)
    }

    /// Syncs and releases `file`.
    pub fn close(&mut self, mut file: FatFile) -> FatResult<()> {
        self.sync(&mut file)
    }
}

/// Formats text straight into a file, e.g. `write!(fs.writer(&mut file), "{:.2}", x)`.
pub struct FileWriter<'a, D: BlockDevice> {
    fs: &'a mut FatFs<D>,
    file: &'a mut FatFile,
}

impl<D: BlockDevice> core::fmt::Write for FileWriter<'_, D> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        match self.fs.write(self.file, s.as_bytes()) {
            Ok(written) if written == s.len() => Ok(()),
            _ => Err(core::fmt::Error),
        }
    }
}
