use crate::error::FsError;
use crate::header::FileHeader;
use crate::io::{BlockStorage, SharedDisk};
use crate::SECTOR_SIZE;

/// A byte stream over the file whose header lives in `sector`.
///
/// Reads and writes never go past the end of the file; files keep the size
/// they were created with.
pub struct OpenFile<T: BlockStorage> {
    disk: SharedDisk<T>,
    sector: u32,
    header: FileHeader,
    seek_position: usize,
}

impl<T: BlockStorage> OpenFile<T> {
    /// Opens the file whose header is stored in `sector`.
    pub fn open(disk: SharedDisk<T>, sector: u32) -> Result<Self, FsError> {
        let header = FileHeader::fetch_from(&disk, sector)?;
        Ok(Self::with_header(disk, sector, header))
    }

    /// Opens a file from a header already in memory, e.g. one that was just
    /// written to `sector`.
    pub fn with_header(disk: SharedDisk<T>, sector: u32, header: FileHeader) -> Self {
        Self {
            disk,
            sector,
            header,
            seek_position: 0,
        }
    }

    pub fn sector(&self) -> u32 {
        self.sector
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn length(&self) -> usize {
        self.header.file_length()
    }

    pub fn disk(&self) -> &SharedDisk<T> {
        &self.disk
    }

    pub fn seek(&mut self, position: usize) {
        self.seek_position = position;
    }

    /// Reads from the current position and advances it by the bytes read.
    pub fn read(&mut self, into: &mut [u8]) -> Result<usize, FsError> {
        let read = self.read_at(into, self.seek_position)?;
        self.seek_position += read;
        Ok(read)
    }

    /// Writes at the current position and advances it by the bytes written.
    pub fn write(&mut self, from: &[u8]) -> Result<usize, FsError> {
        let written = self.write_at(from, self.seek_position)?;
        self.seek_position += written;
        Ok(written)
    }

    /// Reads up to `into.len()` bytes starting at `position`. Returns the number
    /// of bytes read, which is short when the request runs past end of file.
    pub fn read_at(&self, into: &mut [u8], position: usize) -> Result<usize, FsError> {
        let num_bytes = self.clamp(into.len(), position);
        if num_bytes == 0 {
            return Ok(0);
        }

        let first_sector = position / SECTOR_SIZE;
        let last_sector = (position + num_bytes - 1) / SECTOR_SIZE;
        let mut buf = vec![0; (last_sector - first_sector + 1) * SECTOR_SIZE];
        for (i, chunk) in buf.chunks_exact_mut(SECTOR_SIZE).enumerate() {
            let sector = self.header.byte_to_sector((first_sector + i) * SECTOR_SIZE);
            self.disk.read_sector(sector as usize, chunk)?;
        }

        let start = position - first_sector * SECTOR_SIZE;
        into[..num_bytes].copy_from_slice(&buf[start..start + num_bytes]);
        Ok(num_bytes)
    }

    /// Writes up to `from.len()` bytes starting at `position`. Returns the
    /// number of bytes written, which is short when the request runs past end
    /// of file.
    pub fn write_at(&self, from: &[u8], position: usize) -> Result<usize, FsError> {
        let num_bytes = self.clamp(from.len(), position);
        if num_bytes == 0 {
            return Ok(0);
        }

        let first_sector = position / SECTOR_SIZE;
        let last_sector = (position + num_bytes - 1) / SECTOR_SIZE;
        let mut buf = vec![0; (last_sector - first_sector + 1) * SECTOR_SIZE];
        let start = position - first_sector * SECTOR_SIZE;
        let end = start + num_bytes;

        // Partially covered sectors at either end keep their old contents.
        if start != 0 {
            let sector = self.header.byte_to_sector(first_sector * SECTOR_SIZE);
            self.disk.read_sector(sector as usize, &mut buf[..SECTOR_SIZE])?;
        }
        if end % SECTOR_SIZE != 0 && (last_sector != first_sector || start == 0) {
            let sector = self.header.byte_to_sector(last_sector * SECTOR_SIZE);
            let tail = buf.len() - SECTOR_SIZE;
            self.disk.read_sector(sector as usize, &mut buf[tail..])?;
        }

        buf[start..end].copy_from_slice(&from[..num_bytes]);
        for (i, chunk) in buf.chunks_exact(SECTOR_SIZE).enumerate() {
            let sector = self.header.byte_to_sector((first_sector + i) * SECTOR_SIZE);
            self.disk.write_sector(sector as usize, chunk)?;
        }
        Ok(num_bytes)
    }

    fn clamp(&self, requested: usize, position: usize) -> usize {
        let length = self.length();
        if position >= length {
            return 0;
        }
        requested.min(length - position)
    }
}
