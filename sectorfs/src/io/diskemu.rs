use super::block::{BlockNumber, BlockStorage};
use crate::SECTOR_SIZE;
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{BufWriter, ErrorKind, SeekFrom};
use std::path::Path;

pub struct FileBlockEmulator {
    /// The file must be a fixed-size file some exact multiple of the size of a sector.
    fd: File,
    /// The total number of sectors available in the file store.
    block_count: usize,
}

/// Emulates a sector addressed disk in userspace using a file as block storage.
/// This is only meant to be used for file system development and testing.
impl FileBlockEmulator {
    /// Returns ownership of the underlying file descriptor to the caller.
    pub fn into_file(self) -> File {
        self.fd
    }

    fn check_range(&self, blocknr: BlockNumber) -> std::io::Result<()> {
        if blocknr >= self.block_count {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "block out of range",
            ));
        }
        Ok(())
    }
}

impl BlockStorage for FileBlockEmulator {
    fn open_disk<P: AsRef<Path>>(dest: P, nblocks: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized,
    {
        // Return error if the file does not exist rather than create one.
        let file = OpenOptions::new().read(true).write(true).open(dest)?;
        if file.metadata()?.len() < (nblocks * SECTOR_SIZE) as u64 {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "disk image is smaller than the requested sector count",
            ));
        }
        Ok(FileBlockEmulator {
            fd: file,
            block_count: nblocks,
        })
    }

    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()> {
        self.check_range(blocknr)?;
        if buf.len() < SECTOR_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "buffer does not contain enough space to read block",
            ));
        }
        self.fd
            .seek(SeekFrom::Start((blocknr * SECTOR_SIZE) as u64))?;
        self.fd.read_exact(&mut buf[..SECTOR_SIZE])
    }

    /// This method truncates writes that exceed the sector size.
    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()> {
        self.check_range(blocknr)?;
        self.fd
            .seek(SeekFrom::Start((blocknr * SECTOR_SIZE) as u64))?;

        let max = buf.len().min(SECTOR_SIZE);
        self.fd.write_all(&buf[0..max])
    }

    fn sync_disk(&mut self) -> std::io::Result<()> {
        self.fd.sync_all()
    }

    fn block_count(&self) -> usize {
        self.block_count
    }
}

pub struct FileBlockEmulatorBuilder {
    fd: File,
    block_count: usize,
    clear: bool,
}

impl From<File> for FileBlockEmulatorBuilder {
    fn from(fd: File) -> Self {
        FileBlockEmulatorBuilder {
            fd,
            block_count: 0,
            clear: true,
        }
    }
}

impl FileBlockEmulatorBuilder {
    /// Sets the number of desired sectors in the block store device.
    pub fn with_sector_count(mut self, sectors: usize) -> Self {
        self.block_count = sectors;
        self
    }

    /// Zeroes the medium on build when set, which is the default. Turn it off to
    /// reopen a disk image that already holds a file system.
    pub fn clear_medium(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// This builder assumed ownership of the file descriptor used and does
    /// destructive things to prepare the file for use. Additionally, ownership
    /// of the file is transfered to the emulator meaning this builder can only
    /// be used to create one emulator.
    pub fn build(mut self) -> std::io::Result<FileBlockEmulator> {
        if self.block_count == 0 {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "sector count must be set",
            ));
        }
        if self.clear {
            self.zero_medium()?;
        } else if self.fd.metadata()?.len() < (self.block_count * SECTOR_SIZE) as u64 {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "disk image is smaller than the requested sector count",
            ));
        }
        Ok(FileBlockEmulator {
            fd: self.fd,
            block_count: self.block_count,
        })
    }

    fn zero_medium(&mut self) -> std::io::Result<()> {
        self.fd.seek(SeekFrom::Start(0))?;
        let mut bfd = BufWriter::new(&self.fd);
        // Zero out the "disk", buffering each write to prevent excessive writes.
        for _ in 0..self.block_count {
            bfd.write_all(&[0x00; SECTOR_SIZE])?;
        }
        bfd.flush()
    }
}
