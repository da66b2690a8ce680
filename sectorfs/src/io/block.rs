use std::path::Path;

/// Index of a sector on a device, from 0 to `block_count() - 1`.
pub type BlockNumber = usize;

/// A device that moves whole sectors of `SECTOR_SIZE` bytes.
///
/// The file system never reads or writes less than a sector at a time; partial
/// updates are read-modify-write in the layers above.
pub trait BlockStorage {
    /// Opens an existing disk image holding `nblocks` sectors. The contents are
    /// not checked, mounting a file system on top does that.
    fn open_disk<P: AsRef<Path>>(path: P, nblocks: usize) -> std::io::Result<Self>
    where
        Self: std::marker::Sized;
    /// Reads sector `blocknr` into the front of `buf`.
    ///
    /// # Errors
    ///
    /// Fails for sectors past the end of the device and for buffers shorter
    /// than a sector.
    fn read_block(&mut self, blocknr: BlockNumber, buf: &mut [u8]) -> std::io::Result<()>;
    /// Writes at most one sector from `buf` to sector `blocknr`.
    ///
    /// # Errors
    ///
    /// Fails for sectors past the end of the device.
    fn write_block(&mut self, blocknr: BlockNumber, buf: &[u8]) -> std::io::Result<()>;
    /// Flushes buffered writes to the medium.
    fn sync_disk(&mut self) -> std::io::Result<()>;
    fn block_count(&self) -> usize;
}
