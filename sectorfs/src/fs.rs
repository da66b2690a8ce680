use crate::bitmap::Bitmap;
use crate::directory::Directory;
use crate::error::FsError;
use crate::fd::{DescriptorTable, OpenFileId};
use crate::header::FileHeader;
use crate::io::{BlockStorage, SharedDisk};
use crate::openfile::OpenFile;
use crate::path;
use crate::{DIRECTORY_SECTOR, FREE_MAP_SECTOR, NUM_DIR_ENTRIES};

/// A file system on a sector addressed block device.
///
/// The bitmap file and the root directory file are opened when the file
/// system is formatted or mounted and stay open until it is shut down.
pub struct FileSystem<T: BlockStorage> {
    pub(crate) disk: SharedDisk<T>,
    num_sectors: usize,
    /// Bit map of free disk sectors, represented as a file.
    pub(crate) free_map_file: OpenFile<T>,
    /// Root directory, represented as a file.
    pub(crate) directory_file: OpenFile<T>,
    pub(crate) descriptors: DescriptorTable<OpenFile<T>>,
}

impl<T: BlockStorage> FileSystem<T> {
    /// Formats `dev` when `format` is set, otherwise mounts what is on it.
    pub fn new(dev: T, format: bool) -> Result<Self, FsError> {
        if format {
            Self::format(dev)
        } else {
            Self::mount(dev)
        }
    }

    /// Initializes an empty file system onto owned block storage. Everything
    /// previously on the device is lost.
    ///
    /// The headers of the bitmap and the root directory go to their well-known
    /// sectors first, then both files get their data sectors, and finally the
    /// initial bitmap and an empty directory are written through the now open
    /// files.
    pub fn format(dev: T) -> Result<Self, FsError> {
        let disk = SharedDisk::new(dev);
        let num_sectors = disk.sector_count();
        info!("formatting {} sectors", num_sectors);
        if num_sectors <= DIRECTORY_SECTOR as usize {
            return Err(FsError::NoSpace);
        }

        let mut free_map = Bitmap::new(num_sectors);
        free_map.set_reserved(FREE_MAP_SECTOR as usize);
        free_map.set_reserved(DIRECTORY_SECTOR as usize);

        let mut map_hdr = FileHeader::default();
        map_hdr.allocate(&mut free_map, Bitmap::file_size(num_sectors))?;
        let mut dir_hdr = FileHeader::default();
        dir_hdr.allocate(&mut free_map, Directory::file_size(NUM_DIR_ENTRIES))?;

        map_hdr.write_back(&disk, FREE_MAP_SECTOR)?;
        dir_hdr.write_back(&disk, DIRECTORY_SECTOR)?;

        let free_map_file = OpenFile::with_header(disk.clone(), FREE_MAP_SECTOR, map_hdr);
        let directory_file = OpenFile::with_header(disk.clone(), DIRECTORY_SECTOR, dir_hdr);
        free_map.write_back(&free_map_file)?;
        Directory::new(NUM_DIR_ENTRIES).write_back(&directory_file)?;
        disk.sync()?;
        debug!("{}", free_map);

        Ok(Self {
            disk,
            num_sectors,
            free_map_file,
            directory_file,
            descriptors: DescriptorTable::new(),
        })
    }

    /// Opens the file system already on `dev`.
    pub fn mount(dev: T) -> Result<Self, FsError> {
        let disk = SharedDisk::new(dev);
        let num_sectors = disk.sector_count();
        info!("mounting {} sectors", num_sectors);
        if num_sectors <= DIRECTORY_SECTOR as usize {
            return Err(FsError::Corrupt("device too small".to_string()));
        }

        let free_map_file = OpenFile::open(disk.clone(), FREE_MAP_SECTOR)?;
        let directory_file = OpenFile::open(disk.clone(), DIRECTORY_SECTOR)?;
        if free_map_file.length() != Bitmap::file_size(num_sectors) {
            warn!("bitmap file is {} bytes long", free_map_file.length());
            return Err(FsError::Corrupt(
                "bitmap does not match the device size".to_string(),
            ));
        }
        if directory_file.length() != Directory::file_size(NUM_DIR_ENTRIES) {
            warn!("root directory is {} bytes long", directory_file.length());
            return Err(FsError::Corrupt("root directory has the wrong size".to_string()));
        }
        let free_map = Bitmap::fetch_from(&free_map_file, num_sectors)?;
        if !free_map.test(FREE_MAP_SECTOR as usize) || !free_map.test(DIRECTORY_SECTOR as usize) {
            return Err(FsError::Corrupt("bootstrap sectors marked free".to_string()));
        }

        Ok(Self {
            disk,
            num_sectors,
            free_map_file,
            directory_file,
            descriptors: DescriptorTable::new(),
        })
    }

    /// Closes every descriptor, flushes the device and hands it back.
    pub fn shutdown(self) -> Result<T, FsError> {
        info!(
            "shutting down with {} open descriptors",
            self.descriptors.bound()
        );
        let Self {
            disk,
            free_map_file,
            directory_file,
            descriptors,
            ..
        } = self;
        drop((descriptors, free_map_file, directory_file));
        disk.sync()?;
        disk.try_into_inner()
            .map_err(|_| FsError::Corrupt("device still in use".to_string()))
    }

    pub fn sector_count(&self) -> usize {
        self.num_sectors
    }

    /// The root directory file, open for the life of the file system.
    pub fn root_file(&self) -> &OpenFile<T> {
        &self.directory_file
    }

    pub(crate) fn load_free_map(&self) -> Result<Bitmap, FsError> {
        Bitmap::fetch_from(&self.free_map_file, self.num_sectors)
    }

    /// Sectors not yet allocated to any file.
    pub fn free_sector_count(&self) -> Result<usize, FsError> {
        Ok(self.load_free_map()?.num_clear())
    }

    /// Opens a file for reading and writing.
    pub fn open(&self, name: &str) -> Result<OpenFile<T>, FsError> {
        debug!("open({:?})", name);
        let res = path::resolve(&self.directory_file, name)?;
        match res.target {
            Some(sector) => OpenFile::open(self.disk.clone(), sector),
            None => Err(FsError::NotFound(name.to_string())),
        }
    }

    /// Opens `name` and binds it to the lowest free descriptor.
    pub fn open_file(&mut self, name: &str) -> Result<OpenFileId, FsError> {
        if !self.descriptors.has_free_slot() {
            return Err(FsError::TooManyOpenFiles);
        }
        let file = self.open(name)?;
        let id = self.descriptors.bind(file)?;
        debug!("open_file({:?}) -> {}", name, id);
        Ok(id)
    }

    pub fn write_file(&mut self, id: OpenFileId, buf: &[u8]) -> Result<usize, FsError> {
        self.descriptors.get_mut(id)?.write(buf)
    }

    pub fn read_file(&mut self, id: OpenFileId, buf: &mut [u8]) -> Result<usize, FsError> {
        self.descriptors.get_mut(id)?.read(buf)
    }

    pub fn close_file(&mut self, id: OpenFileId) -> Result<(), FsError> {
        debug!("close_file({})", id);
        self.descriptors.unbind(id).map(drop)
    }

    /// Size of the on-disk header of `name`.
    pub fn header_size(&self, name: &str) -> Result<usize, FsError> {
        Ok(self.open(name)?.header().header_size())
    }

    /// Dumps the bitmap and root directory headers, the bitmap, the root
    /// directory and the header of every root entry.
    pub fn print(&self) -> Result<String, FsError> {
        let free_map = self.load_free_map()?;
        let directory = Directory::fetch_from(&self.directory_file)?;

        let mut out = format!(
            "Bit map file header:\n{}Directory file header:\n{}{}{}",
            self.free_map_file.header(),
            self.directory_file.header(),
            free_map,
            directory
        );
        for entry in directory.list() {
            let header = FileHeader::fetch_from(&self.disk, entry.sector)?;
            out.push_str(&format!("{}: {}", entry.name, header));
        }
        Ok(out)
    }
}
