//! Create and remove.
//!
//! Every mutating operation gathers its changes in a [`WorkingSet`]: a private
//! copy of the bitmap, a private copy of the parent directory and the header
//! it is about to write. Nothing reaches the disk until the whole operation
//! has succeeded; an error simply drops the working set.

use crate::bitmap::Bitmap;
use crate::directory::{self, Directory, EntryKind};
use crate::error::FsError;
use crate::fs::FileSystem;
use crate::header::FileHeader;
use crate::io::{BlockStorage, SharedDisk};
use crate::openfile::OpenFile;
use crate::path::{self, Resolution};
use crate::NUM_DIR_ENTRIES;

/// A new file waiting to be written by [`WorkingSet::commit`].
struct StagedFile {
    sector: u32,
    header: FileHeader,
    /// Initial contents for a new directory.
    table: Option<Directory>,
}

#[must_use = "a working set that is not committed discards its changes"]
pub(crate) struct WorkingSet {
    free_map: Bitmap,
    parent: Directory,
    staged: Option<StagedFile>,
}

impl WorkingSet {
    pub(crate) fn begin(free_map: Bitmap, parent: Directory) -> Self {
        Self {
            free_map,
            parent,
            staged: None,
        }
    }

    /// Takes a free sector for a new file header.
    pub(crate) fn reserve_header(&mut self) -> Result<u32, FsError> {
        self.free_map.find_and_set().ok_or(FsError::NoSpace)
    }

    /// Enters `name` into the parent directory.
    pub(crate) fn link(&mut self, name: &str, sector: u32, kind: EntryKind) -> Result<(), FsError> {
        self.parent.add(name, sector, kind)
    }

    /// Allocates `size` bytes of data sectors for the header at `sector` and
    /// stages the header for writing.
    pub(crate) fn allocate(
        &mut self,
        sector: u32,
        size: usize,
        table: Option<Directory>,
    ) -> Result<(), FsError> {
        let mut header = FileHeader::default();
        header.allocate(&mut self.free_map, size)?;
        self.staged = Some(StagedFile {
            sector,
            header,
            table,
        });
        Ok(())
    }

    /// Releases everything below the directory open in `dir`.
    pub(crate) fn release_tree<T: BlockStorage>(
        &mut self,
        disk: &SharedDisk<T>,
        dir: &OpenFile<T>,
    ) -> Result<(), FsError> {
        Directory::fetch_from(dir)?.recursive_remove(disk, &mut self.free_map)
    }

    /// Releases the data sectors and the header sector of `file`.
    pub(crate) fn release<T: BlockStorage>(
        &mut self,
        file: &OpenFile<T>,
    ) -> Result<(), FsError> {
        directory::release(file.header(), file.sector(), &mut self.free_map)
    }

    /// True when `sector` is free in this working set. Every open file has a
    /// live header, so for those this means the operation releases it.
    pub(crate) fn frees(&self, sector: u32) -> bool {
        let blocknr = sector as usize;
        blocknr < self.free_map.len() && !self.free_map.test(blocknr)
    }

    pub(crate) fn unlink(&mut self, name: &str) -> bool {
        self.parent.remove(name)
    }

    /// Writes the staged header, the parent directory and the bitmap.
    pub(crate) fn commit<T: BlockStorage>(
        self,
        disk: &SharedDisk<T>,
        free_map_file: &OpenFile<T>,
        parent_file: &OpenFile<T>,
    ) -> Result<(), FsError> {
        if let Some(staged) = self.staged {
            staged.header.write_back(disk, staged.sector)?;
            if let Some(table) = staged.table {
                let file = OpenFile::with_header(disk.clone(), staged.sector, staged.header);
                table.write_back(&file)?;
            }
        }
        self.parent.write_back(parent_file)?;
        self.free_map.write_back(free_map_file)?;
        Ok(())
    }
}

impl<T: BlockStorage> FileSystem<T> {
    /// Creates a file of `initial_size` bytes. Files cannot grow later.
    ///
    /// Fails if the name is taken, a directory on the way is missing, the
    /// parent directory is full, or the disk lacks room for the header or the
    /// data. A failed create leaves the disk untouched.
    pub fn create(&mut self, name: &str, initial_size: usize) -> Result<(), FsError> {
        debug!("create({:?}, {})", name, initial_size);
        self.allocate_file(name, EntryKind::File, initial_size)
            .map_err(|err| aborted("create", name, err))
    }

    /// Creates an empty directory. Its table has the fixed size of
    /// `NUM_DIR_ENTRIES` entries and is allocated like any other file, so a
    /// disk too full to hold it fails with `NoSpace`.
    pub fn create_directory(&mut self, name: &str) -> Result<(), FsError> {
        debug!("create_directory({:?})", name);
        let size = Directory::file_size(NUM_DIR_ENTRIES);
        self.allocate_file(name, EntryKind::Directory, size)
            .map_err(|err| aborted("create_directory", name, err))
    }

    /// Deletes a file or an empty directory. Fails with `FileInUse` while a
    /// descriptor is bound to it.
    pub fn remove(&mut self, name: &str) -> Result<(), FsError> {
        debug!("remove({:?})", name);
        self.remove_file(name, false)
            .map_err(|err| aborted("remove", name, err))
    }

    /// Deletes a file, or a directory together with everything below it.
    /// Nothing is removed if any file in the tree has a bound descriptor.
    pub fn recursive_remove(&mut self, name: &str) -> Result<(), FsError> {
        debug!("recursive_remove({:?})", name);
        self.remove_file(name, true)
            .map_err(|err| aborted("recursive_remove", name, err))
    }

    fn allocate_file(&mut self, name: &str, kind: EntryKind, size: usize) -> Result<(), FsError> {
        let res = path::resolve(&self.directory_file, name)?;
        let leaf = match (&res.leaf, res.target) {
            (None, _) => return Err(FsError::InvalidName(name.to_string())),
            (Some(_), Some(_)) => return Err(FsError::AlreadyExists(name.to_string())),
            (Some(_), None) if !res.complete => return Err(FsError::NotFound(name.to_string())),
            (Some(leaf), None) => leaf.clone(),
        };
        let Resolution {
            handle, directory, ..
        } = res;

        let mut txn = WorkingSet::begin(self.load_free_map()?, directory);
        let sector = txn.reserve_header()?;
        txn.link(&leaf, sector, kind)?;
        let table = match kind {
            EntryKind::Directory => Some(Directory::new(NUM_DIR_ENTRIES)),
            EntryKind::File => None,
        };
        txn.allocate(sector, size, table)?;
        txn.commit(&self.disk, &self.free_map_file, handle.file())?;

        info!("created {:?} ({:?}, {} bytes) at sector {}", name, kind, size, sector);
        Ok(())
    }

    fn remove_file(&mut self, name: &str, recursive: bool) -> Result<(), FsError> {
        let res = path::resolve(&self.directory_file, name)?;
        let (Some(leaf), Some(sector)) = (res.leaf.clone(), res.target) else {
            return Err(FsError::NotFound(name.to_string()));
        };
        let is_dir = res.directory.is_dir(&leaf);
        let Resolution {
            handle, directory, ..
        } = res;

        let target = OpenFile::open(self.disk.clone(), sector)?;
        let mut txn = WorkingSet::begin(self.load_free_map()?, directory);
        if is_dir {
            if recursive {
                txn.release_tree(&self.disk, &target)?;
            } else if !Directory::fetch_from(&target)?.is_empty() {
                return Err(FsError::DirectoryNotEmpty(name.to_string()));
            }
        }
        txn.release(&target)?;
        if let Some(id) = self.descriptors.find(|file| txn.frees(file.sector())) {
            debug!("descriptor {} still reads {:?}", id, name);
            return Err(FsError::FileInUse(name.to_string()));
        }
        txn.unlink(&leaf);
        txn.commit(&self.disk, &self.free_map_file, handle.file())?;

        info!("removed {:?} from sector {}", name, sector);
        Ok(())
    }
}

fn aborted(op: &str, name: &str, err: FsError) -> FsError {
    warn!("{}({:?}) aborted: {}", op, name, err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{FileBlockEmulator, FileBlockEmulatorBuilder};
    use crate::SECTOR_SIZE;

    fn create_test_fs(sectors: usize) -> FileSystem<FileBlockEmulator> {
        let dev = FileBlockEmulatorBuilder::from(tempfile::tempfile().unwrap())
            .with_sector_count(sectors)
            .build()
            .expect("Could not initialize disk emulator.");
        FileSystem::format(dev).unwrap()
    }

    #[test]
    fn create_then_open_has_requested_size() {
        let mut fs = create_test_fs(128);

        fs.create("a", 300).unwrap();

        let file = fs.open("a").unwrap();
        assert_eq!(file.length(), 300);
        assert_eq!(file.header().num_sectors(), 3);
    }

    #[test]
    fn create_uses_one_header_sector_plus_data() {
        let mut fs = create_test_fs(128);
        let before = fs.free_sector_count().unwrap();

        fs.create("a", 2 * SECTOR_SIZE).unwrap();

        assert_eq!(fs.free_sector_count().unwrap(), before - 3);
    }

    #[test]
    fn duplicate_create_changes_nothing() {
        let mut fs = create_test_fs(128);
        fs.create("a", 100).unwrap();
        let free = fs.free_sector_count().unwrap();
        let entries = fs.list("").unwrap();

        let err = fs.create("a", 50).unwrap_err();

        assert!(matches!(err, FsError::AlreadyExists(_)));
        assert_eq!(fs.free_sector_count().unwrap(), free);
        assert_eq!(fs.list("").unwrap(), entries);
        assert_eq!(fs.open("a").unwrap().length(), 100);
    }

    #[test]
    fn create_without_room_for_data_changes_nothing() {
        let mut fs = create_test_fs(32);
        let free = fs.free_sector_count().unwrap();

        // One sector more than the disk has left once the header is placed.
        let err = fs.create("big", free * SECTOR_SIZE).unwrap_err();

        assert!(matches!(err, FsError::NoSpace));
        assert_eq!(fs.free_sector_count().unwrap(), free);
        assert!(matches!(fs.open("big"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn create_in_full_directory_fails() {
        let mut fs = create_test_fs(256);
        for i in 0..NUM_DIR_ENTRIES {
            fs.create(&format!("f{}", i), 0).unwrap();
        }
        let free = fs.free_sector_count().unwrap();

        assert!(matches!(fs.create("extra", 0), Err(FsError::DirectoryFull)));
        assert_eq!(fs.free_sector_count().unwrap(), free);
    }

    #[test]
    fn create_below_missing_directory_fails() {
        let mut fs = create_test_fs(128);
        fs.create_directory("a").unwrap();

        assert!(matches!(fs.create("a/b/c", 10), Err(FsError::NotFound(_))));
        // The walk stopped at "b"; it must not have been created instead.
        assert!(fs.open("a/b").is_err());
    }

    #[test]
    fn create_with_empty_name_fails() {
        let mut fs = create_test_fs(64);
        assert!(matches!(fs.create("/", 10), Err(FsError::InvalidName(_))));
        assert!(matches!(fs.create("averylongname", 10), Err(FsError::InvalidName(_))));
    }

    #[test]
    fn create_directory_holds_empty_table() {
        let mut fs = create_test_fs(128);

        fs.create_directory("d").unwrap();

        let dir = fs.open("d").unwrap();
        assert_eq!(dir.length(), Directory::file_size(NUM_DIR_ENTRIES));
        assert!(fs.list("d").unwrap().is_empty());
    }

    #[test]
    fn create_directory_without_room_for_table_fails() {
        // 11 sectors go to the bootstrap files; a directory needs 9 more.
        let mut fs = create_test_fs(19);
        let free = fs.free_sector_count().unwrap();

        assert!(matches!(fs.create_directory("d"), Err(FsError::NoSpace)));
        assert_eq!(fs.free_sector_count().unwrap(), free);
    }

    #[test]
    fn remove_frees_sectors_for_reuse() {
        let mut fs = create_test_fs(64);
        let free = fs.free_sector_count().unwrap();
        fs.create("a", 200).unwrap();
        let header_sector = fs.open("a").unwrap().sector();

        fs.remove("a").unwrap();

        assert!(matches!(fs.open("a"), Err(FsError::NotFound(_))));
        assert_eq!(fs.free_sector_count().unwrap(), free);
        fs.create("b", 10).unwrap();
        assert_eq!(fs.open("b").unwrap().sector(), header_sector);
    }

    #[test]
    fn remove_missing_name_fails() {
        let mut fs = create_test_fs(64);
        assert!(matches!(fs.remove("nope"), Err(FsError::NotFound(_))));
        assert!(matches!(fs.recursive_remove("nope"), Err(FsError::NotFound(_))));
        assert!(matches!(fs.remove(""), Err(FsError::NotFound(_))));
    }

    #[test]
    fn plain_remove_refuses_non_empty_directory() {
        let mut fs = create_test_fs(128);
        fs.create_directory("d").unwrap();
        fs.create("d/f", 10).unwrap();
        let free = fs.free_sector_count().unwrap();

        assert!(matches!(fs.remove("d"), Err(FsError::DirectoryNotEmpty(_))));
        assert_eq!(fs.free_sector_count().unwrap(), free);

        fs.remove("d/f").unwrap();
        fs.remove("d").unwrap();
        assert!(fs.list("").unwrap().is_empty());
    }

    #[test]
    fn recursive_remove_frees_whole_tree() {
        let mut fs = create_test_fs(256);
        let free = fs.free_sector_count().unwrap();
        fs.create_directory("d").unwrap();
        fs.create("d/f1", 100).unwrap();
        fs.create("d/f2", 300).unwrap();
        fs.create_directory("d/d2").unwrap();
        fs.create("d/d2/f3", 200).unwrap();

        fs.recursive_remove("d").unwrap();

        assert_eq!(fs.free_sector_count().unwrap(), free);
        for name in ["d", "d/f1", "d/f2", "d/d2", "d/d2/f3"] {
            assert!(fs.open(name).is_err(), "{} still resolves", name);
        }
        assert!(fs.list("").unwrap().is_empty());
    }

    #[test]
    fn recursive_remove_of_nested_directory_keeps_siblings() {
        let mut fs = create_test_fs(256);
        fs.create_directory("d").unwrap();
        fs.create("d/keep", 10).unwrap();
        fs.create_directory("d/sub").unwrap();
        fs.create("d/sub/f", 10).unwrap();

        fs.recursive_remove("d/sub").unwrap();

        let names: Vec<_> = fs.list("d").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["keep"]);
    }

    #[test]
    fn recursive_remove_on_plain_file_acts_like_remove() {
        let mut fs = create_test_fs(64);
        let free = fs.free_sector_count().unwrap();
        fs.create("f", 10).unwrap();

        fs.recursive_remove("f").unwrap();

        assert_eq!(fs.free_sector_count().unwrap(), free);
    }

    #[test]
    fn dropped_working_set_writes_nothing() {
        let mut fs = create_test_fs(64);
        let free = fs.free_sector_count().unwrap();
        let root = Directory::fetch_from(fs.root_file()).unwrap();

        let mut txn = WorkingSet::begin(fs.load_free_map().unwrap(), root);
        let sector = txn.reserve_header().unwrap();
        txn.link("ghost", sector, EntryKind::File).unwrap();
        txn.allocate(sector, 100, None).unwrap();
        drop(txn);

        assert_eq!(fs.free_sector_count().unwrap(), free);
        assert!(fs.open("ghost").is_err());
    }

    #[test]
    fn create_without_room_for_header_changes_nothing() {
        let mut fs = create_test_fs(32);
        // 21 sectors left: two directories take 9 each, three empty files one each.
        fs.create_directory("a").unwrap();
        fs.create_directory("b").unwrap();
        for name in ["e0", "e1", "a/e2"] {
            fs.create(name, 0).unwrap();
        }
        assert_eq!(fs.free_sector_count().unwrap(), 0);
        let entries = fs.list("").unwrap();

        assert!(matches!(fs.create("z", 0), Err(FsError::NoSpace)));
        assert!(matches!(fs.create_directory("c"), Err(FsError::NoSpace)));

        assert_eq!(fs.free_sector_count().unwrap(), 0);
        assert_eq!(fs.list("").unwrap(), entries);
        assert!(matches!(fs.open("z"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn remove_with_corrupt_header_fails_cleanly() {
        let mut fs = create_test_fs(64);
        fs.create("f", 10).unwrap();
        let sector = fs.open("f").unwrap().sector();
        let free = fs.free_sector_count().unwrap();

        // Ten bytes in one data sector, far past the end of the disk.
        let mut raw = [0u8; SECTOR_SIZE];
        raw[..4].copy_from_slice(&10u32.to_ne_bytes());
        raw[4..8].copy_from_slice(&1u32.to_ne_bytes());
        raw[8..12].copy_from_slice(&9999u32.to_ne_bytes());
        fs.disk.write_sector(sector as usize, &raw).unwrap();

        assert!(matches!(fs.remove("f"), Err(FsError::Corrupt(_))));
        assert!(matches!(fs.recursive_remove("f"), Err(FsError::Corrupt(_))));
        assert_eq!(fs.free_sector_count().unwrap(), free);
    }

    #[test]
    fn remove_of_open_file_is_refused() {
        let mut fs = create_test_fs(64);
        fs.create("a", 10).unwrap();
        let id = fs.open_file("a").unwrap();
        let free = fs.free_sector_count().unwrap();

        assert!(matches!(fs.remove("a"), Err(FsError::FileInUse(_))));
        assert_eq!(fs.free_sector_count().unwrap(), free);

        fs.close_file(id).unwrap();
        fs.remove("a").unwrap();
        assert!(matches!(fs.open("a"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn recursive_remove_refuses_tree_with_open_file() {
        let mut fs = create_test_fs(128);
        fs.create_directory("d").unwrap();
        fs.create_directory("d/e").unwrap();
        fs.create("d/e/f", 10).unwrap();
        let id = fs.open_file("d/e/f").unwrap();

        assert!(matches!(fs.recursive_remove("d"), Err(FsError::FileInUse(_))));
        assert_eq!(fs.open("d/e/f").unwrap().length(), 10);

        fs.close_file(id).unwrap();
        fs.recursive_remove("d").unwrap();
    }
}
