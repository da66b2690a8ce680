//! Path name resolution.
//!
//! Names are slash separated and always relative to the root directory.
//! Empty components are ignored, so "a//b", "/a/b" and "a/b/" are the same
//! path.

use crate::directory::Directory;
use crate::error::FsError;
use crate::io::BlockStorage;
use crate::openfile::OpenFile;

/// The directory file a resolution ended in.
pub enum DirHandle<'r, T: BlockStorage> {
    /// The root directory file, owned by the file system.
    Root(&'r OpenFile<T>),
    /// A subdirectory opened while walking the path. Dropped with the handle.
    Owned(OpenFile<T>),
}

impl<T: BlockStorage> DirHandle<'_, T> {
    pub fn file(&self) -> &OpenFile<T> {
        match self {
            DirHandle::Root(file) => file,
            DirHandle::Owned(file) => file,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, DirHandle::Root(_))
    }
}

pub struct Resolution<'r, T: BlockStorage> {
    /// Directory holding (or that would hold) the leaf.
    pub handle: DirHandle<'r, T>,
    /// Entries of `handle`, loaded during the walk.
    pub directory: Directory,
    /// Last component examined. `None` only for an empty path.
    pub leaf: Option<String>,
    /// Header sector of the leaf when it exists.
    pub target: Option<u32>,
    /// False when the walk stopped on a missing or non-directory intermediate
    /// component, in which case `leaf` is that component.
    pub complete: bool,
}

/// Walks `path` starting at the root directory file.
///
/// Every component but the last must name a subdirectory. The last one is
/// looked up without checking its kind. A failed intermediate lookup stops
/// the walk and later components are never examined.
pub fn resolve<'r, T: BlockStorage>(
    root: &'r OpenFile<T>,
    path: &str,
) -> Result<Resolution<'r, T>, FsError> {
    let mut resolution = Resolution {
        handle: DirHandle::Root(root),
        directory: Directory::fetch_from(root)?,
        leaf: None,
        target: None,
        complete: true,
    };

    let mut tokens = path.split('/').filter(|t| !t.is_empty()).peekable();
    while let Some(token) = tokens.next() {
        resolution.leaf = Some(token.to_string());
        resolution.target = resolution.directory.find(token);
        if tokens.peek().is_none() {
            break;
        }

        match resolution.target {
            Some(sector) if resolution.directory.is_dir(token) => {
                let file = OpenFile::open(root.disk().clone(), sector)?;
                resolution.directory = Directory::fetch_from(&file)?;
                // Replacing the handle closes the previous subdirectory.
                resolution.handle = DirHandle::Owned(file);
            }
            _ => {
                trace!("resolve({:?}) stopped at {:?}", path, token);
                resolution.target = None;
                resolution.complete = false;
                break;
            }
        }
    }
    Ok(resolution)
}
