//! On-disk directory entries and the naming rules around them.
use super::{
    Cluster, FatError, FatResult, FatType,
    date::{Date, DateTime},
};
use alloc::{format, string::String, vec::Vec};
use bitflags::bitflags;
use sdfat_core::static_assert;

/// Size of a directory entry in bytes (always 32 bytes)
pub const DIR_ENTRY_SIZE: usize = 32;
/// Number of directory slots held by one 512-byte sector
pub const ENTRIES_PER_SECTOR: usize = 16;

static_assert!(DIR_ENTRY_SIZE * ENTRIES_PER_SECTOR == super::SECTOR_SIZE);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Directory entry attributes
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        /// Marks a long file name fragment
        const LONG_NAME = Self::READ_ONLY.bits()
            | Self::HIDDEN.bits()
            | Self::SYSTEM.bits()
            | Self::VOLUME_ID.bits();
    }
}

impl Attributes {
    const LONG_NAME_MASK: u8 = 0x3F;

    #[must_use]
    #[inline]
    pub const fn is_read_only(self) -> bool {
        self.contains(Self::READ_ONLY)
    }

    #[must_use]
    #[inline]
    pub const fn is_hidden(self) -> bool {
        self.contains(Self::HIDDEN)
    }

    #[must_use]
    #[inline]
    pub const fn is_system(self) -> bool {
        self.contains(Self::SYSTEM)
    }

    #[must_use]
    #[inline]
    pub const fn is_volume_id(self) -> bool {
        self.contains(Self::VOLUME_ID) && !self.is_long_name()
    }

    #[must_use]
    #[inline]
    pub const fn is_directory(self) -> bool {
        self.contains(Self::DIRECTORY) && !self.is_long_name()
    }

    #[must_use]
    #[inline]
    pub const fn is_archive(self) -> bool {
        self.contains(Self::ARCHIVE)
    }

    #[must_use]
    #[inline]
    pub const fn is_long_name(self) -> bool {
        self.bits() & Self::LONG_NAME_MASK == Self::LONG_NAME.bits()
    }
}

/// A short (8.3) directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    /// Space padded base name followed by the extension
    name: [u8; 11],
    attr: Attributes,
    /// Case flags written by Windows NT
    nt_res: u8,
    creation_hundredths: u8,
    creation_time: u16,
    creation_date: u16,
    last_access_date: u16,
    /// Only meaningful on FAT32
    first_cluster_high: u16,
    write_time: u16,
    write_date: u16,
    first_cluster_low: u16,
    file_size: u32,
}

impl DirEntry {
    /// Deleted entry marker (first byte)
    pub const DELETED_ENTRY: u8 = 0xE5;
    /// End of directory marker (first byte)
    pub const END_OF_ENTRIES: u8 = 0x00;
    /// Stands for a real 0xE5 as first name byte
    pub const ESCAPED_E5: u8 = 0x05;
    pub const DOT_ENTRY: [u8; 11] = *b".          ";
    pub const DOTDOT_ENTRY: [u8; 11] = *b"..         ";

    const LOWERCASE_BASE: u8 = 0x08;
    const LOWERCASE_EXT: u8 = 0x10;

    #[must_use]
    /// Creates an entry stamped with `now` for creation, access and write.
    pub fn new(name: [u8; 11], attr: Attributes, now: DateTime) -> Self {
        let date = now.date().to_dos();
        let (time, hundredths) = now.time().to_dos();
        Self {
            name,
            attr,
            nt_res: 0,
            creation_hundredths: hundredths,
            creation_time: time,
            creation_date: date,
            last_access_date: date,
            first_cluster_high: 0,
            write_time: time,
            write_date: date,
            first_cluster_low: 0,
            file_size: 0,
        }
    }

    #[must_use]
    pub fn from_bytes(raw: &[u8; DIR_ENTRY_SIZE]) -> Self {
        let u16_at = |offset: usize| u16::from_le_bytes([raw[offset], raw[offset + 1]]);
        let mut name = [0; 11];
        name.copy_from_slice(&raw[..11]);
        Self {
            name,
            attr: Attributes::from_bits_retain(raw[11]),
            nt_res: raw[12],
            creation_hundredths: raw[13],
            creation_time: u16_at(14),
            creation_date: u16_at(16),
            last_access_date: u16_at(18),
            first_cluster_high: u16_at(20),
            write_time: u16_at(22),
            write_date: u16_at(24),
            first_cluster_low: u16_at(26),
            file_size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut raw = [0; DIR_ENTRY_SIZE];
        raw[..11].copy_from_slice(&self.name);
        raw[11] = self.attr.bits();
        raw[12] = self.nt_res;
        raw[13] = self.creation_hundredths;
        raw[14..16].copy_from_slice(&self.creation_time.to_le_bytes());
        raw[16..18].copy_from_slice(&self.creation_date.to_le_bytes());
        raw[18..20].copy_from_slice(&self.last_access_date.to_le_bytes());
        raw[20..22].copy_from_slice(&self.first_cluster_high.to_le_bytes());
        raw[22..24].copy_from_slice(&self.write_time.to_le_bytes());
        raw[24..26].copy_from_slice(&self.write_date.to_le_bytes());
        raw[26..28].copy_from_slice(&self.first_cluster_low.to_le_bytes());
        raw[28..].copy_from_slice(&self.file_size.to_le_bytes());
        raw
    }

    #[must_use]
    #[inline]
    pub const fn is_dot(&self) -> bool {
        self.name[0] == b'.'
    }

    #[must_use]
    #[inline]
    pub const fn attributes(&self) -> Attributes {
        self.attr
    }

    #[inline]
    pub const fn set_attributes(&mut self, attributes: Attributes) {
        self.attr = attributes;
    }

    #[must_use]
    #[inline]
    /// Returns the raw 8.3 name as stored
    pub const fn name_raw(&self) -> &[u8; 11] {
        &self.name
    }

    #[must_use]
    /// Returns the 8.3 name for display, e.g. `README.TXT`.
    pub fn short_name(&self) -> String {
        display_short_name(&self.name, self.nt_res)
    }

    #[must_use]
    pub fn first_cluster(&self, fat_type: FatType) -> Cluster {
        let low = u32::from(self.first_cluster_low);
        let high = match fat_type {
            FatType::Fat32 => u32::from(self.first_cluster_high) << 16,
            FatType::Fat16 => 0,
        };
        Cluster::new(low | high)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub const fn set_first_cluster(&mut self, cluster: Cluster, fat_type: FatType) {
        self.first_cluster_low = (cluster.value() & 0xFFFF) as u16;
        self.first_cluster_high = match fat_type {
            FatType::Fat32 => (cluster.value() >> 16) as u16,
            FatType::Fat16 => 0,
        };
    }

    #[must_use]
    #[inline]
    pub const fn file_size(&self) -> u32 {
        self.file_size
    }

    #[inline]
    pub const fn set_file_size(&mut self, size: u32) {
        self.file_size = size;
    }

    #[must_use]
    pub const fn creation_datetime(&self) -> DateTime {
        DateTime::from_dos(
            self.creation_date,
            self.creation_time,
            self.creation_hundredths,
        )
    }

    #[must_use]
    pub const fn last_access_date(&self) -> Date {
        Date::from_dos(self.last_access_date)
    }

    #[must_use]
    pub const fn last_write_datetime(&self) -> DateTime {
        DateTime::from_dos(self.write_date, self.write_time, 0)
    }

    /// Stamps a modification: write time and last access date.
    pub fn touch(&mut self, now: DateTime) {
        self.write_date = now.date().to_dos();
        self.write_time = now.time().to_dos().0;
        self.last_access_date = self.write_date;
    }
}

/// One fragment of a long file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongNameEntry {
    /// Sequence number, bit 6 set on the fragment holding the name's end
    seq_num: u8,
    checksum: u8,
    chars: [u16; LongNameEntry::CHARS_PER_ENTRY],
}

impl LongNameEntry {
    /// Last entry marker in sequence number
    pub const LAST_ENTRY: u8 = 0x40;
    /// Character count per LFN entry
    pub const CHARS_PER_ENTRY: usize = 13;
    /// A 255 character name never needs more fragments.
    pub const MAX_ENTRIES: usize = 20;

    /// Byte offsets of the UTF-16 code units inside the raw slot
    const CHAR_OFFSETS: [usize; Self::CHARS_PER_ENTRY] =
        [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];

    #[must_use]
    #[inline]
    pub const fn new(seq_num: u8, checksum: u8, is_last: bool) -> Self {
        let seq_num = if is_last {
            seq_num | Self::LAST_ENTRY
        } else {
            seq_num
        };
        Self {
            seq_num,
            checksum,
            chars: [0xFFFF; Self::CHARS_PER_ENTRY],
        }
    }

    #[must_use]
    pub fn from_bytes(raw: &[u8; DIR_ENTRY_SIZE]) -> Self {
        let mut chars = [0; Self::CHARS_PER_ENTRY];
        for (ch, &offset) in chars.iter_mut().zip(Self::CHAR_OFFSETS.iter()) {
            *ch = u16::from_le_bytes([raw[offset], raw[offset + 1]]);
        }
        Self {
            seq_num: raw[0],
            checksum: raw[13],
            chars,
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut raw = [0; DIR_ENTRY_SIZE];
        raw[0] = self.seq_num;
        raw[11] = Attributes::LONG_NAME.bits();
        raw[13] = self.checksum;
        for (ch, &offset) in self.chars.iter().zip(Self::CHAR_OFFSETS.iter()) {
            raw[offset..offset + 2].copy_from_slice(&ch.to_le_bytes());
        }
        raw
    }

    #[must_use]
    #[inline]
    pub const fn is_last(&self) -> bool {
        self.seq_num & Self::LAST_ENTRY != 0
    }

    #[must_use]
    #[inline]
    pub const fn seq_num(&self) -> u8 {
        self.seq_num & !Self::LAST_ENTRY
    }

    #[must_use]
    #[inline]
    pub const fn checksum(&self) -> u8 {
        self.checksum
    }

    #[must_use]
    #[inline]
    pub const fn chars(&self) -> &[u16; Self::CHARS_PER_ENTRY] {
        &self.chars
    }
}

/// Calculate the checksum for a 8.3 filename
pub(crate) fn calc_short_name_checksum(name: &[u8; 11]) -> u8 {
    name.iter()
        .fold(0u8, |sum, &b| sum.rotate_right(1).wrapping_add(b))
}

/// Builds the fragments spelling out `name`, in on-disk order (highest sequence first).
///
/// The caller has validated `name`, so it holds at most 255 UTF-16 units.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn long_name_entries(name: &str, checksum: u8) -> Vec<LongNameEntry> {
    let units: Vec<u16> = name.encode_utf16().collect();
    let count = units.len().div_ceil(LongNameEntry::CHARS_PER_ENTRY);

    (1..=count)
        .rev()
        .map(|seq| {
            let mut entry = LongNameEntry::new(seq as u8, checksum, seq == count);
            let chunk = &units[(seq - 1) * LongNameEntry::CHARS_PER_ENTRY..];
            let chunk = &chunk[..chunk.len().min(LongNameEntry::CHARS_PER_ENTRY)];
            entry.chars[..chunk.len()].copy_from_slice(chunk);
            // Terminator only if the name does not fill the fragment
            if chunk.len() < LongNameEntry::CHARS_PER_ENTRY {
                entry.chars[chunk.len()] = 0x0000;
            }
            entry
        })
        .collect()
}

/// Collects long name fragments while a directory is scanned.
///
/// Fragments arrive highest sequence first. A name is only handed out once it is
/// complete and every fragment carries the checksum of the short entry that
/// follows it; anything else is dropped and the short name is used instead.
#[derive(Debug, Default)]
pub(crate) struct LongNameAssembler {
    fragments: Vec<LongNameEntry>,
    first_slot: u32,
}

impl LongNameAssembler {
    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    pub fn push(&mut self, entry: LongNameEntry, slot: u32) {
        if entry.is_last() {
            self.fragments.clear();
            self.first_slot = slot;
            self.fragments.push(entry);
            return;
        }

        let follows = self.fragments.last().is_some_and(|prev| {
            prev.seq_num() == entry.seq_num() + 1 && prev.checksum() == entry.checksum()
        });
        if follows && self.fragments.len() < LongNameEntry::MAX_ENTRIES {
            self.fragments.push(entry);
        } else {
            log::warn!("Discarding out of sequence long name fragment at slot {slot}");
            self.fragments.clear();
        }
    }

    /// Returns the assembled name, the slot of its first fragment and the
    /// number of fragments, consuming the buffered fragments.
    pub fn take(&mut self, short_name: &[u8; 11]) -> Option<(String, u32, u8)> {
        if self.fragments.is_empty() {
            return None;
        }

        let expected = calc_short_name_checksum(short_name);
        let complete = self.fragments.last().is_some_and(|f| f.seq_num() == 1)
            && usize::from(self.fragments[0].seq_num()) == self.fragments.len();
        let matches = self.fragments.iter().all(|f| f.checksum() == expected);

        let result = if complete && matches {
            let units = self
                .fragments
                .iter()
                .rev()
                .flat_map(|f| f.chars().iter().copied())
                .take_while(|&u| u != 0x0000)
                .filter(|&u| u != 0xFFFF);
            let name: String = char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect();
            #[allow(clippy::cast_possible_truncation)]
            let count = self.fragments.len() as u8;
            (!name.is_empty()).then_some((name, self.first_slot, count))
        } else {
            log::warn!(
                "Long name for {} does not match its short entry, using the short name",
                display_short_name(short_name, 0)
            );
            None
        };

        self.fragments.clear();
        result
    }
}

/// Characters allowed in a short name besides `A-Z` and `0-9`.
const SHORT_NAME_SPECIALS: &[u8] = b"!#$%&'()-@^_`{}~";
/// Characters forbidden in any name.
const FORBIDDEN: &[char] = &['"', '*', '/', ':', '<', '>', '?', '\\', '|'];

#[inline]
fn is_short_name_char(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit() || SHORT_NAME_SPECIALS.contains(&b)
}

/// Checks that `name` can be stored as a long name.
pub(crate) fn validate_long_name(name: &str) -> FatResult<()> {
    let units = name.encode_utf16().count();
    let forbidden = name.chars().any(|c| c < ' ' || FORBIDDEN.contains(&c));
    if units == 0
        || units > 255
        || forbidden
        || name.ends_with(['.', ' '])
        || name.starts_with(' ')
    {
        return Err(FatError::IncorrectEntry);
    }
    Ok(())
}

#[must_use]
/// Converts `name` to its 8.3 form if it is a valid short name, ignoring case.
///
/// This is how path components are looked up.
pub(crate) fn to_short_name(name: &str) -> Option<[u8; 11]> {
    match name {
        "." => return Some(DirEntry::DOT_ENTRY),
        ".." => return Some(DirEntry::DOTDOT_ENTRY),
        _ => {}
    }

    let (base, ext) = match name.rfind('.') {
        Some(0) => return None,
        Some(i) => (&name[..i], &name[i + 1..]),
        None => (name, ""),
    };
    if base.is_empty() || base.len() > 8 || ext.len() > 3 || base.contains('.') {
        return None;
    }

    let mut raw = [b' '; 11];
    for (dst, b) in raw[..8].iter_mut().zip(base.bytes()) {
        *dst = b.to_ascii_uppercase();
    }
    for (dst, b) in raw[8..].iter_mut().zip(ext.bytes()) {
        *dst = b.to_ascii_uppercase();
    }
    let len_ok = base.is_ascii() && ext.is_ascii();
    let chars_ok = raw
        .iter()
        .filter(|&&b| b != b' ')
        .all(|&b| is_short_name_char(b));
    (len_ok && chars_ok && !name.contains(' ')).then_some(raw)
}

#[must_use]
/// Returns `true` if `name` can be stored as a bare short entry without losing anything.
pub(crate) fn fits_short_entry(name: &str) -> bool {
    to_short_name(name).is_some() && !name.bytes().any(|b| b.is_ascii_lowercase())
}

/// Derives the short alias (`BASENA~N.EXT`) stored next to a long name.
///
/// `taken` holds the short names already present in the directory.
pub(crate) fn generate_alias(name: &str, taken: &[[u8; 11]]) -> FatResult<[u8; 11]> {
    let trimmed = name.trim_start_matches('.');
    let (base, ext) = match trimmed.rfind('.') {
        Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
        None => (trimmed, ""),
    };

    let mut lossy = false;
    let mut clean = |part: &str, max: usize| {
        let mut out = Vec::with_capacity(max);
        for c in part.chars() {
            if c == ' ' || c == '.' {
                lossy = true;
                continue;
            }
            let upper = c.to_ascii_uppercase();
            let b = if upper.is_ascii() && is_short_name_char(upper as u8) {
                upper as u8
            } else {
                lossy = true;
                b'_'
            };
            if out.len() == max {
                lossy = true;
                break;
            }
            out.push(b);
        }
        out
    };
    let mut base = clean(base, 8);
    let ext = clean(ext, 3);
    if base.is_empty() {
        base.push(b'_');
        lossy = true;
    }

    let build = |base: &[u8], tail: &[u8]| {
        let mut raw = [b' '; 11];
        raw[..base.len()].copy_from_slice(base);
        raw[base.len()..base.len() + tail.len()].copy_from_slice(tail);
        raw[8..8 + ext.len()].copy_from_slice(&ext);
        raw
    };

    if !lossy {
        let candidate = build(&base, &[]);
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
    }

    let mut tail = Vec::with_capacity(7);
    for n in 1..=999_999u32 {
        tail.clear();
        tail.extend_from_slice(format!("~{n}").as_bytes());
        let keep = base.len().min(8 - tail.len());
        let candidate = build(&base[..keep], &tail);
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
    }
    Err(FatError::Exist)
}

#[must_use]
/// Formats a raw 8.3 name as `BASE.EXT`.
pub(crate) fn display_short_name(raw: &[u8; 11], nt_res: u8) -> String {
    let mut out = String::with_capacity(12);
    let base_len = raw[..8].iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    let ext_len = raw[8..].iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);

    let push = |out: &mut String, bytes: &[u8], lower: bool| {
        for &b in bytes {
            let b = if lower { b.to_ascii_lowercase() } else { b };
            out.push(char::from(b));
        }
    };

    let mut base = [0u8; 8];
    base[..base_len].copy_from_slice(&raw[..base_len]);
    if base[0] == DirEntry::ESCAPED_E5 {
        base[0] = DirEntry::DELETED_ENTRY;
    }
    push(&mut out, &base[..base_len], nt_res & DirEntry::LOWERCASE_BASE != 0);
    if ext_len > 0 {
        out.push('.');
        push(&mut out, &raw[8..8 + ext_len], nt_res & DirEntry::LOWERCASE_EXT != 0);
    }
    out
}

#[must_use]
/// Formats a raw volume label, which has no extension dot.
pub(crate) fn display_label(raw: &[u8; 11]) -> String {
    let len = raw.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    raw[..len].iter().map(|&b| char::from(b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::fat::date::{Date, Time};

    #[test]
    fn test_attributes() {
        let attr = Attributes::READ_ONLY | Attributes::HIDDEN;
        assert!(attr.is_read_only());
        assert!(attr.is_hidden());
        assert!(!attr.is_system());
        assert!(!attr.is_directory());
        assert!(!attr.is_long_name());

        let long_name = Attributes::LONG_NAME;
        assert!(long_name.is_long_name());
        assert!(!long_name.is_volume_id());
        assert!(!long_name.is_directory());

        // Reserved high bits do not hide a long name fragment
        assert!(Attributes::from_bits_retain(0x0F | 0x40).is_long_name());
        assert!(Attributes::VOLUME_ID.is_volume_id());
    }

    #[test]
    fn test_dir_entry_layout() {
        let now = DateTime::new(Date::new(2023, 3, 15), Time::new(14, 30, 44, 0));
        let mut entry = DirEntry::new(*b"TEST    TXT", Attributes::ARCHIVE, now);
        entry.set_first_cluster(Cluster::new(0x0012_3456), FatType::Fat32);
        entry.set_file_size(0x0102_0304);

        let raw = entry.to_bytes();
        assert_eq!(&raw[..11], b"TEST    TXT");
        assert_eq!(raw[11], 0x20);
        assert_eq!(&raw[20..22], &[0x12, 0x00]);
        assert_eq!(&raw[26..28], &[0x56, 0x34]);
        assert_eq!(&raw[28..32], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(DirEntry::from_bytes(&raw), entry);

        assert_eq!(entry.first_cluster(FatType::Fat32), Cluster::new(0x0012_3456));
        assert_eq!(entry.first_cluster(FatType::Fat16), Cluster::new(0x3456));
        assert_eq!(entry.last_write_datetime(), now);
        assert_eq!(entry.creation_datetime(), now);
        assert_eq!(entry.last_access_date(), now.date());
    }

    #[test]
    fn test_fat16_entry_clears_high_word() {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw[20] = 0xAA;
        let mut entry = DirEntry::from_bytes(&raw);
        entry.set_first_cluster(Cluster::new(7), FatType::Fat16);
        assert_eq!(&entry.to_bytes()[20..22], &[0, 0]);
    }

    #[test]
    fn test_long_name_entry_offsets() {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw[0] = 0x41;
        raw[11] = 0x0F;
        raw[13] = 0x5A;
        raw[1] = b'a';
        raw[14] = b'f';
        raw[28] = b'l';
        raw[30] = b'm';
        let entry = LongNameEntry::from_bytes(&raw);
        assert!(entry.is_last());
        assert_eq!(entry.seq_num(), 1);
        assert_eq!(entry.checksum(), 0x5A);
        assert_eq!(entry.chars()[0], u16::from(b'a'));
        assert_eq!(entry.chars()[5], u16::from(b'f'));
        assert_eq!(entry.chars()[11], u16::from(b'l'));
        assert_eq!(entry.chars()[12], u16::from(b'm'));
        assert_eq!(entry.to_bytes(), raw);
    }

    #[test]
    fn test_short_name_checksum() {
        assert_eq!(calc_short_name_checksum(b"TEST    TXT"), 143);
        assert_eq!(calc_short_name_checksum(b"README  TXT"), 115);
    }

    #[test]
    fn test_long_name_entries() {
        // 13 characters exactly: no terminator, no padding
        let entries = long_name_entries("abcdefghijklm", 0x11);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_last());
        assert!(entries[0].chars().iter().all(|&c| c != 0 && c != 0xFFFF));

        let entries = long_name_entries("Long File Name.txt", 0x22);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].seq_num(), 2);
        assert!(entries[0].is_last());
        assert_eq!(entries[1].seq_num(), 1);
        assert!(!entries[1].is_last());
        // "Long File Nam" | "e.txt" + terminator + padding
        assert_eq!(entries[0].chars()[4], u16::from(b't'));
        assert_eq!(entries[0].chars()[5], 0x0000);
        assert_eq!(entries[0].chars()[6], 0xFFFF);
    }

    #[test]
    fn test_assembler() {
        let short = *b"LONGFI~1TXT";
        let checksum = calc_short_name_checksum(&short);
        let mut assembler = LongNameAssembler::default();
        for (i, entry) in long_name_entries("Long File Name.txt", checksum).into_iter().enumerate() {
            assembler.push(entry, 4 + u32::try_from(i).unwrap());
        }
        let (name, first_slot, count) = assembler.take(&short).unwrap();
        assert_eq!(name, "Long File Name.txt");
        assert_eq!(first_slot, 4);
        assert_eq!(count, 2);
        assert!(assembler.take(&short).is_none());
    }

    #[test]
    fn test_assembler_rejects_bad_checksum() {
        let short = *b"LONGFI~1TXT";
        let mut assembler = LongNameAssembler::default();
        for entry in long_name_entries("Long File Name.txt", 0) {
            assembler.push(entry, 0);
        }
        assert!(assembler.take(&short).is_none());
    }

    #[test]
    fn test_assembler_rejects_missing_fragment() {
        let short = *b"LONGFI~1TXT";
        let checksum = calc_short_name_checksum(&short);
        let mut assembler = LongNameAssembler::default();
        let entries = long_name_entries("Long File Name.txt", checksum);
        assembler.push(entries[0], 0);
        assert!(assembler.take(&short).is_none());

        // An orphan without its last-flagged head is ignored
        assembler.push(entries[1], 1);
        assert!(assembler.take(&short).is_none());
    }

    #[test]
    fn test_to_short_name() {
        assert_eq!(to_short_name("readme.txt"), Some(*b"README  TXT"));
        assert_eq!(to_short_name("A.TXT"), Some(*b"A       TXT"));
        assert_eq!(to_short_name("FOLDER"), Some(*b"FOLDER     "));
        assert_eq!(to_short_name(".."), Some(DirEntry::DOTDOT_ENTRY));
        assert_eq!(to_short_name("toolongname.txt"), None);
        assert_eq!(to_short_name("a.b.c"), None);
        assert_eq!(to_short_name(".hidden"), None);
        assert_eq!(to_short_name("with space.txt"), None);
        assert_eq!(to_short_name("a+b.txt"), None);
    }

    #[test]
    fn test_fits_short_entry() {
        assert!(fits_short_entry("A.TXT"));
        assert!(!fits_short_entry("a.txt"));
        assert!(!fits_short_entry("Long File Name.txt"));
    }

    #[test]
    fn test_generate_alias() {
        assert_eq!(
            generate_alias("Long File Name.txt", &[]).unwrap(),
            *b"LONGFI~1TXT"
        );
        assert_eq!(generate_alias("readme.txt", &[]).unwrap(), *b"README  TXT");
        assert_eq!(
            generate_alias("readme.txt", &[*b"README  TXT"]).unwrap(),
            *b"README~1TXT"
        );
        assert_eq!(
            generate_alias("Long File Name.txt", &[*b"LONGFI~1TXT"]).unwrap(),
            *b"LONGFI~2TXT"
        );
        assert_eq!(generate_alias("archive.tar.gz", &[]).unwrap(), *b"ARCHIV~1GZ ");
        assert_eq!(generate_alias("a+b", &[]).unwrap(), *b"A_B~1      ");
    }

    #[test]
    fn test_validate_long_name() {
        assert!(validate_long_name("Long File Name.txt").is_ok());
        assert_eq!(validate_long_name(""), Err(FatError::IncorrectEntry));
        assert_eq!(validate_long_name("a:b"), Err(FatError::IncorrectEntry));
        assert_eq!(validate_long_name("what?"), Err(FatError::IncorrectEntry));
        assert_eq!(validate_long_name("trailing."), Err(FatError::IncorrectEntry));
        assert_eq!(
            validate_long_name(&"x".repeat(256)),
            Err(FatError::IncorrectEntry)
        );
    }

    #[test]
    fn test_display_short_name() {
        assert_eq!(display_short_name(b"README  TXT", 0), "README.TXT");
        assert_eq!(display_short_name(b"FOLDER     ", 0), "FOLDER");
        assert_eq!(display_short_name(b"README  TXT", 0x18), "readme.txt");
        assert_eq!(display_short_name(b"\x05BC     TXT", 0), "\u{e5}BC.TXT");
        assert_eq!(display_label(b"MY VOLUME  "), "MY VOLUME");
    }
}
