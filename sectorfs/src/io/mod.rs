mod block;
mod diskemu;

pub use block::{BlockNumber, BlockStorage};
pub use diskemu::{FileBlockEmulator, FileBlockEmulatorBuilder};

use std::cell::RefCell;
use std::rc::Rc;

/// A block device shared by every open file of one file system.
///
/// The file system is single threaded, so the device sits behind a
/// `Rc<RefCell<_>>`. Each call borrows the device for one sector transfer only.
pub struct SharedDisk<T: BlockStorage>(Rc<RefCell<T>>);

impl<T: BlockStorage> SharedDisk<T> {
    pub fn new(dev: T) -> Self {
        Self(Rc::new(RefCell::new(dev)))
    }

    pub fn read_sector(&self, sector: BlockNumber, buf: &mut [u8]) -> std::io::Result<()> {
        self.0.borrow_mut().read_block(sector, buf)
    }

    pub fn write_sector(&self, sector: BlockNumber, buf: &[u8]) -> std::io::Result<()> {
        self.0.borrow_mut().write_block(sector, buf)
    }

    pub fn sync(&self) -> std::io::Result<()> {
        self.0.borrow_mut().sync_disk()
    }

    pub fn sector_count(&self) -> usize {
        self.0.borrow().block_count()
    }

    /// Hands the device back once no other handle refers to it.
    pub fn try_into_inner(self) -> Result<T, Self> {
        Rc::try_unwrap(self.0)
            .map(RefCell::into_inner)
            .map_err(SharedDisk)
    }
}

impl<T: BlockStorage> Clone for SharedDisk<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}
