use crate::BlockDeviceError;
use alloc::{string::String, vec::Vec};
use thiserror::Error;

pub mod fat;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum FileError {
    #[error("I/O error")]
    Io,
    #[error("File not found")]
    NotFound,
    #[error("Invalid path")]
    InvalidPath,
    #[error("File already exists")]
    AlreadyExists,
    #[error("File system is full")]
    NotEnoughSpace,
    #[error("Unexpected end of file")]
    UnexpectedEof,
    #[error("Permission denied")]
    PermissionDenied,
    #[error("File system is corrupted")]
    CorruptedFS,
}

impl From<BlockDeviceError> for FileError {
    fn from(error: BlockDeviceError) -> Self {
        match error {
            BlockDeviceError::Io
            | BlockDeviceError::UnalignedAccess
            | BlockDeviceError::NotReady
            | BlockDeviceError::Unsupported => Self::Io,
            BlockDeviceError::OutOfBounds => Self::UnexpectedEof,
        }
    }
}

impl From<fat::FatError> for FileError {
    fn from(error: fat::FatError) -> Self {
        use fat::FatError;
        match error {
            FatError::Device => Self::Io,
            FatError::NotFound | FatError::NoPath => Self::NotFound,
            FatError::Exist => Self::AlreadyExists,
            FatError::NoSpace => Self::NotEnoughSpace,
            FatError::Eof => Self::UnexpectedEof,
            FatError::Denied => Self::PermissionDenied,
            FatError::Fat => Self::CorruptedFS,
            FatError::IncorrectEntry
            | FatError::PathTooLong
            | FatError::NotADirectory
            | FatError::AtRoot
            | FatError::IndexOutOfRange => Self::InvalidPath,
        }
    }
}

pub type FileResult<T> = Result<T, FileError>;

/// Path-addressed access to a mounted volume.
///
/// Every call stands alone: files are looked up again each time. Streams and
/// directory cursors are offered by the volume types themselves.
pub trait FileSystem {
    /// Creates an empty file; fails if `path` is taken.
    fn create(&mut self, path: Path) -> FileResult<()>;
    /// Removes a file or an empty directory.
    fn delete(&mut self, path: Path) -> FileResult<()>;
    fn exists(&mut self, path: Path) -> FileResult<bool>;
    /// Prepares `path` for access. May do nothing.
    fn open(&mut self, path: Path) -> FileResult<()>;
    /// Counterpart of [`FileSystem::open`]. May do nothing.
    fn close(&mut self, path: Path) -> FileResult<()>;
    /// Copies bytes from `offset` on into `buffer` and returns the count.
    fn read(&mut self, path: Path, buffer: &mut [u8], offset: usize) -> FileResult<usize>;
    /// Stores `buffer` at `offset`, which may be at most the file size, and returns the count.
    fn write(&mut self, path: Path, buffer: &[u8], offset: usize) -> FileResult<usize>;
    fn metadata(&mut self, path: Path) -> FileResult<FileMetadata>;
    /// Lists the items of a directory as full paths.
    fn read_dir(&mut self, path: Path) -> FileResult<Vec<PathBuf>>;
}

#[inline]
const fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub struct PathBuf(String);

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub struct Path<'a>(&'a str);

impl PathBuf {
    #[must_use]
    #[inline]
    pub fn new(path: &str) -> Self {
        Self(String::from(path))
    }

    #[must_use]
    #[inline]
    pub fn root() -> Self {
        Self::new("/")
    }

    #[inline]
    /// Appends `path` verbatim.
    pub fn push(&mut self, path: &str) {
        self.0.push_str(path);
    }

    /// Appends one component, adding a separator if needed.
    pub fn push_component(&mut self, name: &str) {
        if !self.0.ends_with(is_separator) {
            self.0.push('/');
        }
        self.0.push_str(name);
    }

    /// Drops the last component. Returns `false` if the path was already the root.
    pub fn pop(&mut self) -> bool {
        let Some((parent, _)) = self.as_path().split_last() else {
            return false;
        };
        let parent_len = parent.as_str().trim_end_matches(is_separator).len();
        if parent_len == 0 {
            let absolute = self.0.starts_with(is_separator);
            self.0.clear();
            if absolute {
                self.0.push('/');
            }
        } else {
            self.0.truncate(parent_len);
        }
        true
    }

    #[must_use]
    #[inline]
    pub fn as_path(&self) -> Path<'_> {
        Path(&self.0)
    }

    #[inline]
    pub fn join(&self, path: &str) -> PathBuf {
        let mut new_path = self.clone();
        new_path.push_component(path);
        new_path
    }
}

impl core::borrow::Borrow<str> for PathBuf {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl<'a> Path<'a> {
    #[must_use]
    #[inline]
    pub const fn new(path: &'a str) -> Self {
        Self(path)
    }

    #[must_use]
    #[inline]
    pub const fn as_str(&self) -> &'a str {
        self.0
    }

    #[must_use]
    /// Iterates over the non-empty components, accepting both `/` and `\` separators.
    pub fn components(&self) -> impl DoubleEndedIterator<Item = &'a str> + use<'a> {
        self.0.split(is_separator).filter(|c| !c.is_empty())
    }

    #[must_use]
    #[inline]
    pub fn is_root(&self) -> bool {
        self.components().next().is_none()
    }

    #[must_use]
    /// Splits the path into its parent directory and its last component.
    ///
    /// Returns `None` for the root.
    pub fn split_last(&self) -> Option<(Path<'a>, &'a str)> {
        let trimmed = self.0.trim_end_matches(is_separator);
        let start = trimmed.rfind(is_separator).map_or(0, |i| i + 1);
        let name = &trimmed[start..];
        if name.is_empty() {
            return None;
        }
        Some((Path(&trimmed[..start]), name))
    }
}

impl Path<'_> {
    #[must_use]
    #[inline]
    pub fn to_owned(&self) -> PathBuf {
        PathBuf::new(self.0)
    }
}

impl<'a> From<&'a str> for Path<'a> {
    #[inline]
    fn from(value: &'a str) -> Self {
        Self(value)
    }
}

impl core::ops::Deref for Path<'_> {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl core::fmt::Display for PathBuf {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FileType {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FileMetadata {
    size: usize,
    file_type: FileType,
}

impl FileMetadata {
    #[must_use]
    #[inline]
    pub const fn new(size: usize, file_type: FileType) -> Self {
        Self { size, file_type }
    }

    #[must_use]
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    #[inline]
    pub const fn file_type(&self) -> FileType {
        self.file_type
    }
}
