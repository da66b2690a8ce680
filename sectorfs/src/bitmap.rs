use crate::error::FsError;
use crate::io::BlockStorage;
use crate::openfile::OpenFile;
use std::fmt;

#[derive(Debug, PartialEq)]
pub enum State {
    Free,
    Used,
}

/// Tracks which sectors of the disk are allocated, one bit per sector.
///
/// The bitmap is itself stored as a file. Mutating operations load a fresh
/// copy, change it in memory and write it back only once the whole operation
/// has succeeded.
#[derive(Clone, Debug, PartialEq)]
pub struct Bitmap {
    bits: Vec<u8>,
    num_bits: usize,
}

impl Bitmap {
    pub fn new(num_bits: usize) -> Self {
        Self {
            bits: vec![0; Self::file_size(num_bits)],
            num_bits,
        }
    }

    /// Bytes needed to persist a bitmap tracking `num_bits` sectors.
    pub fn file_size(num_bits: usize) -> usize {
        num_bits.div_ceil(8)
    }

    /// Loads the bitmap stored in `file`.
    pub fn fetch_from<T: BlockStorage>(
        file: &OpenFile<T>,
        num_bits: usize,
    ) -> Result<Self, FsError> {
        let mut map = Self::new(num_bits);
        let read = file.read_at(&mut map.bits, 0)?;
        if read != map.bits.len() {
            return Err(FsError::Corrupt(format!(
                "bitmap file holds {} bytes, expected {}",
                read,
                map.bits.len()
            )));
        }
        Ok(map)
    }

    /// Writes the bitmap back into `file`, overwriting the previous copy.
    pub fn write_back<T: BlockStorage>(&self, file: &OpenFile<T>) -> Result<(), FsError> {
        let written = file.write_at(&self.bits, 0)?;
        if written != self.bits.len() {
            return Err(FsError::Corrupt(format!(
                "bitmap file too small, wrote {} of {} bytes",
                written,
                self.bits.len()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.num_bits
    }

    pub fn get(&self, blocknr: usize) -> State {
        assert!(blocknr < self.num_bits, "sector {} outside bitmap", blocknr);
        let mask = 0b01_u8 << (blocknr % 8);
        match self.bits[blocknr / 8] & mask {
            0 => State::Free,
            _ => State::Used,
        }
    }

    pub fn test(&self, blocknr: usize) -> bool {
        self.get(blocknr) == State::Used
    }

    pub fn set_reserved(&mut self, blocknr: usize) {
        assert!(blocknr < self.num_bits, "sector {} outside bitmap", blocknr);
        self.bits[blocknr / 8] |= 0b01_u8 << (blocknr % 8);
    }

    pub fn set_free(&mut self, blocknr: usize) {
        assert!(blocknr < self.num_bits, "sector {} outside bitmap", blocknr);
        self.bits[blocknr / 8] &= !(0b01_u8 << (blocknr % 8));
    }

    /// Frees `sector` after checking that it lies on the disk and is in use.
    /// A sector that fails either check means the on-disk metadata is broken.
    pub fn release(&mut self, sector: u32) -> Result<(), FsError> {
        let blocknr = sector as usize;
        if blocknr >= self.len() || !self.test(blocknr) {
            return Err(FsError::Corrupt(format!(
                "sector {} released but not allocated",
                sector
            )));
        }
        self.set_free(blocknr);
        Ok(())
    }

    /// Reserves the lowest free sector and returns it.
    pub fn find_and_set(&mut self) -> Option<u32> {
        let sector = self.free_sectors().next()?;
        self.set_reserved(sector);
        Some(sector as u32)
    }

    /// Number of sectors still free.
    pub fn num_clear(&self) -> usize {
        self.free_sectors().count()
    }

    pub fn free_sectors(&self) -> NextAvailableAllocation<'_> {
        NextAvailableAllocation {
            marker: 0,
            bitmap: self,
        }
    }

    pub fn used_sectors(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_bits).filter(move |&i| self.test(i))
    }
}

impl fmt::Display for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap set:")?;
        for sector in self.used_sectors() {
            write!(f, " {}", sector)?;
        }
        writeln!(f)
    }
}

/// Walks the free sectors of a bitmap in ascending order. Allocation always
/// takes the lowest free sector, so a sector released by a remove is the
/// first one handed out again.
pub struct NextAvailableAllocation<'a> {
    /// Keeps track of the next starting place for looking for available blocks.
    marker: usize,
    bitmap: &'a Bitmap,
}

impl Iterator for NextAvailableAllocation<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        while self.marker < self.bitmap.num_bits {
            let i = self.marker;
            self.marker += 1;
            if let State::Free = self.bitmap.get(i) {
                return Some(i);
            }
        }
        None
    }
}
