use crate::bitmap::Bitmap;
use crate::error::FsError;
use crate::io::{BlockStorage, SharedDisk};
use crate::SECTOR_SIZE;
use std::fmt;
use std::mem::size_of;

use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// Direct data pointers that fit in one sector next to the two size fields.
pub const NUM_DIRECT: usize = (SECTOR_SIZE - 2 * size_of::<u32>()) / size_of::<u32>();
/// Files cannot be bigger than their direct pointers can address.
pub const MAX_FILE_SIZE: usize = NUM_DIRECT * SECTOR_SIZE;

/// On-disk description of one file: its length and the sectors holding its
/// data. A header occupies exactly one sector and is keyed by that sector.
///
/// This structure __must be exactly SECTOR_SIZE bytes.__
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileHeader {
    /// Number of bytes in the file.
    num_bytes: u32,
    /// Number of data sectors in the file.
    num_sectors: u32,
    /// Disk sector numbers for each data block in the file.
    data_sectors: [u32; NUM_DIRECT],
}

const _: () = assert!(size_of::<FileHeader>() == SECTOR_SIZE);

impl Default for FileHeader {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

impl FileHeader {
    /// Reserves enough data sectors from `free_map` to hold `file_size` bytes.
    ///
    /// Sectors are only marked in the in-memory bitmap. When this fails some of
    /// them may already be marked, so the caller must throw the bitmap away.
    pub fn allocate(&mut self, free_map: &mut Bitmap, file_size: usize) -> Result<(), FsError> {
        let num_sectors = file_size.div_ceil(SECTOR_SIZE);
        if num_sectors > NUM_DIRECT {
            warn!(
                "{} bytes exceed the largest file size of {} bytes",
                file_size, MAX_FILE_SIZE
            );
            return Err(FsError::NoSpace);
        }
        if free_map.num_clear() < num_sectors {
            return Err(FsError::NoSpace);
        }

        self.num_bytes = file_size as u32;
        self.num_sectors = num_sectors as u32;
        for slot in self.data_sectors.iter_mut().take(num_sectors) {
            *slot = free_map.find_and_set().ok_or(FsError::NoSpace)?;
        }
        Ok(())
    }

    /// Returns every data sector of this file to `free_map`.
    pub fn deallocate(&self, free_map: &mut Bitmap) -> Result<(), FsError> {
        for &sector in self.data_sectors() {
            free_map.release(sector)?;
        }
        Ok(())
    }

    pub fn fetch_from<T: BlockStorage>(disk: &SharedDisk<T>, sector: u32) -> Result<Self, FsError> {
        let mut buf = [0; SECTOR_SIZE];
        disk.read_sector(sector as usize, &mut buf)?;
        let header = Self::read_from(&buf[..])
            .ok_or_else(|| FsError::Corrupt(format!("short header in sector {}", sector)))?;

        let num_sectors = header.num_sectors as usize;
        if num_sectors > NUM_DIRECT || header.num_bytes as usize > num_sectors * SECTOR_SIZE {
            return Err(FsError::Corrupt(format!(
                "header in sector {} describes {} bytes in {} sectors",
                sector, header.num_bytes, header.num_sectors
            )));
        }
        let count = disk.sector_count();
        if let Some(bad) = header.data_sectors().iter().find(|&&s| s as usize >= count) {
            return Err(FsError::Corrupt(format!(
                "header in sector {} points at sector {} past the end of the disk",
                sector, bad
            )));
        }
        Ok(header)
    }

    pub fn write_back<T: BlockStorage>(&self, disk: &SharedDisk<T>, sector: u32) -> Result<(), FsError> {
        disk.write_sector(sector as usize, self.as_bytes())?;
        Ok(())
    }

    /// Sector holding the byte at `offset` within the file.
    pub fn byte_to_sector(&self, offset: usize) -> u32 {
        self.data_sectors[offset / SECTOR_SIZE]
    }

    pub fn file_length(&self) -> usize {
        self.num_bytes as usize
    }

    pub fn num_sectors(&self) -> usize {
        self.num_sectors as usize
    }

    pub fn data_sectors(&self) -> &[u32] {
        &self.data_sectors[..self.num_sectors()]
    }

    /// Bytes the header itself occupies on disk.
    pub fn header_size(&self) -> usize {
        size_of::<Self>()
    }
}

impl fmt::Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FileHeader contents.  File size: {}.  File blocks:",
            self.num_bytes
        )?;
        for sector in self.data_sectors() {
            write!(f, " {}", sector)?;
        }
        writeln!(f)
    }
}
