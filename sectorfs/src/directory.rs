//! Directory tables.
//!
//! A directory is an ordinary file holding a fixed number of entries. Each
//! entry maps a short name to the sector of a file header and says whether
//! that file is itself a directory.

use crate::bitmap::Bitmap;
use crate::error::FsError;
use crate::header::FileHeader;
use crate::io::{BlockStorage, SharedDisk};
use crate::openfile::OpenFile;
use crate::FILE_NAME_MAX_LEN;
use std::borrow::Cow;
use std::fmt;
use std::mem::size_of;

use zerocopy::{AsBytes, FromBytes, FromZeroes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Clone, Copy, Debug, PartialEq, Eq)]
struct DirectoryEntry {
    in_use: u8,
    is_dir: u8,
    // Last byte stays zero as a terminator.
    name: [u8; FILE_NAME_MAX_LEN + 1],
    sector: u32,
}

const ENTRY_SIZE: usize = size_of::<DirectoryEntry>();

impl DirectoryEntry {
    fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.name.len());
        &self.name[..len]
    }

    fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    fn kind(&self) -> EntryKind {
        if self.is_dir != 0 {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

/// One line of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub sector: u32,
    pub kind: EntryKind,
    /// Nesting level below the listed directory, zero for its own entries.
    pub depth: usize,
}

impl fmt::Display for ListingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            EntryKind::Directory => 'D',
            EntryKind::File => 'F',
        };
        write!(f, "{:width$}[{}] {}", "", tag, self.name, width = self.depth * 4)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Directory {
    table: Vec<DirectoryEntry>,
}

impl Directory {
    /// An empty directory with room for `size` entries.
    pub fn new(size: usize) -> Self {
        Self {
            table: vec![DirectoryEntry::new_zeroed(); size],
        }
    }

    /// Bytes needed to store a table of `size` entries.
    pub fn file_size(size: usize) -> usize {
        size * ENTRY_SIZE
    }

    /// Reads the whole table stored in `file`.
    pub fn fetch_from<T: BlockStorage>(file: &OpenFile<T>) -> Result<Self, FsError> {
        let length = file.length();
        if length % ENTRY_SIZE != 0 {
            return Err(FsError::Corrupt(format!(
                "directory in sector {} is {} bytes long",
                file.sector(),
                length
            )));
        }
        let mut bytes = vec![0; length];
        file.read_at(&mut bytes, 0)?;
        let table = bytes
            .chunks_exact(ENTRY_SIZE)
            .map(DirectoryEntry::read_from)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| FsError::Corrupt("unreadable directory entry".to_string()))?;
        Ok(Self { table })
    }

    /// Writes the table back into `file`.
    pub fn write_back<T: BlockStorage>(&self, file: &OpenFile<T>) -> Result<(), FsError> {
        let bytes = self.table.as_bytes();
        let written = file.write_at(bytes, 0)?;
        if written != bytes.len() {
            return Err(FsError::Corrupt(format!(
                "directory file in sector {} holds {} of {} bytes",
                file.sector(),
                written,
                bytes.len()
            )));
        }
        Ok(())
    }

    fn in_use(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.table.iter().filter(|e| e.in_use != 0)
    }

    fn find_index(&self, name: &str) -> Option<usize> {
        self.table
            .iter()
            .position(|e| e.in_use != 0 && e.name_bytes() == name.as_bytes())
    }

    /// Sector of the header for `name`, if it is in this directory.
    pub fn find(&self, name: &str) -> Option<u32> {
        self.find_index(name).map(|i| self.table[i].sector)
    }

    pub fn kind(&self, name: &str) -> Option<EntryKind> {
        self.find_index(name).map(|i| self.table[i].kind())
    }

    pub fn is_dir(&self, name: &str) -> bool {
        self.kind(name) == Some(EntryKind::Directory)
    }

    pub fn is_empty(&self) -> bool {
        self.in_use().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.in_use().count()
    }

    /// Adds `name` pointing at the header in `sector`.
    pub fn add(&mut self, name: &str, sector: u32, kind: EntryKind) -> Result<(), FsError> {
        if name.is_empty() || name.len() > FILE_NAME_MAX_LEN || name.contains(['/', '\0']) {
            return Err(FsError::InvalidName(name.to_string()));
        }
        if self.find_index(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        let slot = self
            .table
            .iter_mut()
            .find(|e| e.in_use == 0)
            .ok_or(FsError::DirectoryFull)?;

        let mut entry = DirectoryEntry::new_zeroed();
        entry.in_use = 1;
        entry.is_dir = (kind == EntryKind::Directory) as u8;
        entry.name[..name.len()].copy_from_slice(name.as_bytes());
        entry.sector = sector;
        *slot = entry;
        Ok(())
    }

    /// Drops `name` from the table. Returns false when it was not there.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.find_index(name) {
            Some(i) => {
                self.table[i] = DirectoryEntry::new_zeroed();
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<ListingEntry> {
        self.in_use().map(|e| Self::listing(e, 0)).collect()
    }

    /// Appends every entry below this directory to `out`, parents before
    /// their children.
    pub fn recursive_list<T: BlockStorage>(
        &self,
        disk: &SharedDisk<T>,
        depth: usize,
        out: &mut Vec<ListingEntry>,
    ) -> Result<(), FsError> {
        self.list_below(disk, depth, out, &mut Vec::new())
    }

    fn list_below<T: BlockStorage>(
        &self,
        disk: &SharedDisk<T>,
        depth: usize,
        out: &mut Vec<ListingEntry>,
        seen: &mut Vec<u32>,
    ) -> Result<(), FsError> {
        for entry in self.in_use() {
            out.push(Self::listing(entry, depth));
            if entry.kind() == EntryKind::Directory {
                let file = OpenFile::open(disk.clone(), entry.sector)?;
                Self::descend(&file, seen)?.list_below(disk, depth + 1, out, seen)?;
            }
        }
        Ok(())
    }

    /// Releases every file below this directory into `free_map`, depth first.
    /// A subdirectory's children are released before its own header sector.
    ///
    /// Only the bitmap changes; the tables on disk are left as they are since
    /// nothing will reach them once the caller commits.
    pub fn recursive_remove<T: BlockStorage>(
        &self,
        disk: &SharedDisk<T>,
        free_map: &mut Bitmap,
    ) -> Result<(), FsError> {
        self.release_below(disk, free_map, &mut Vec::new())
    }

    fn release_below<T: BlockStorage>(
        &self,
        disk: &SharedDisk<T>,
        free_map: &mut Bitmap,
        seen: &mut Vec<u32>,
    ) -> Result<(), FsError> {
        for entry in self.in_use() {
            let file = OpenFile::open(disk.clone(), entry.sector)?;
            if entry.kind() == EntryKind::Directory {
                Self::descend(&file, seen)?.release_below(disk, free_map, seen)?;
            }
            release(file.header(), entry.sector, free_map)?;
            trace!("released {:?} at sector {}", entry.name(), entry.sector);
        }
        Ok(())
    }

    /// Loads the subdirectory open in `file`, refusing one already visited
    /// during this walk.
    fn descend<T: BlockStorage>(
        file: &OpenFile<T>,
        seen: &mut Vec<u32>,
    ) -> Result<Self, FsError> {
        if seen.contains(&file.sector()) {
            return Err(FsError::Corrupt(format!(
                "directory in sector {} is reachable twice",
                file.sector()
            )));
        }
        seen.push(file.sector());
        Directory::fetch_from(file)
    }

    fn listing(entry: &DirectoryEntry, depth: usize) -> ListingEntry {
        ListingEntry {
            name: entry.name().into_owned(),
            sector: entry.sector,
            kind: entry.kind(),
            depth,
        }
    }
}

/// Frees a file's data sectors and then the sector holding its header.
pub(crate) fn release(
    header: &FileHeader,
    sector: u32,
    free_map: &mut Bitmap,
) -> Result<(), FsError> {
    header.deallocate(free_map)?;
    free_map.release(sector)
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Directory contents:")?;
        for entry in self.in_use() {
            let kind = match entry.kind() {
                EntryKind::Directory => "directory",
                EntryKind::File => "file",
            };
            writeln!(
                f,
                "Name: {}, Sector: {}, Kind: {}",
                entry.name(),
                entry.sector,
                kind
            )?;
        }
        Ok(())
    }
}
