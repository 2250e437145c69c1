//! FAT16/FAT32 volume driver for SD cards and other 512-byte block devices.
//!
//! Mount a [`BlockDevice`] with [`FatFs::mount`], then open files and
//! directories through the returned volume.
#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

extern crate alloc;
pub use sdfat_core::{BlockDevice, BlockDeviceError};

pub mod config;
pub mod fs;
pub mod ramdisk;

pub use config::{MountOptions, PartitionSelect};
pub use fs::fat::{
    FatError, FatFs, FatResult, FatType, MountError, MountResult,
    dir::{DirCursor, FileInfo},
    file::FatFile,
};
pub use ramdisk::RamDisk;
