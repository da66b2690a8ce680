//! A small sector-addressed file system running on a simulated disk.
//!
//! The free-sector bitmap and the root directory are ordinary files whose
//! headers sit at two well-known sectors, so the file system can find them on
//! boot.
//!
//! # Layout
//! ============================================================================
//! | Bitmap header (0) | Root dir header (1) | Bitmap data | Dir data | Free...|
//! ============================================================================
#[macro_use]
extern crate log;

mod bitmap;
mod coordinator;
mod directory;
mod error;
mod fd;
mod fs;
mod header;
pub mod io;
mod openfile;
mod path;
pub mod syscall;
mod tree;

pub use crate::bitmap::{Bitmap, State};
pub use crate::directory::{Directory, EntryKind, ListingEntry};
pub use crate::error::FsError;
pub use crate::fd::{DescriptorTable, OpenFileId};
pub use crate::fs::FileSystem;
pub use crate::header::{FileHeader, MAX_FILE_SIZE, NUM_DIRECT};
pub use crate::openfile::OpenFile;
pub use crate::path::{resolve, DirHandle, Resolution};

/// Bytes per disk sector. A file header fills exactly one sector.
pub const SECTOR_SIZE: usize = 128;

/// Sector holding the header of the free-sector bitmap file.
pub const FREE_MAP_SECTOR: u32 = 0;
/// Sector holding the header of the root directory file.
pub const DIRECTORY_SECTOR: u32 = 1;

/// Entries in every directory table. Directories never grow, so this is also
/// the maximum number of children a directory can hold.
pub const NUM_DIR_ENTRIES: usize = 64;
/// Longest name, in bytes, a directory entry can hold.
pub const FILE_NAME_MAX_LEN: usize = 9;

/// Slots in the open file descriptor table.
pub const MAX_OPEN_FILES: usize = 20;
