use crate::directory::{Directory, ListingEntry};
use crate::error::FsError;
use crate::fs::FileSystem;
use crate::io::BlockStorage;
use crate::openfile::OpenFile;
use crate::path;

impl<T: BlockStorage> FileSystem<T> {
    /// Lists the entries of the directory `name`. An empty name lists the root.
    pub fn list(&self, name: &str) -> Result<Vec<ListingEntry>, FsError> {
        debug!("list({:?})", name);
        Ok(self.load_directory(name)?.list())
    }

    /// Lists everything below the directory `name`, each directory followed
    /// by its own contents one level deeper.
    pub fn recursive_list(&self, name: &str) -> Result<Vec<ListingEntry>, FsError> {
        debug!("recursive_list({:?})", name);
        let mut out = Vec::new();
        self.load_directory(name)?
            .recursive_list(&self.disk, 0, &mut out)?;
        Ok(out)
    }

    fn load_directory(&self, name: &str) -> Result<Directory, FsError> {
        let res = path::resolve(&self.directory_file, name)?;
        match (&res.leaf, res.target) {
            (None, _) => Ok(res.directory),
            (Some(leaf), Some(sector)) if res.directory.is_dir(leaf) => {
                Directory::fetch_from(&OpenFile::open(self.disk.clone(), sector)?)
            }
            (Some(_), Some(_)) => Err(FsError::NotADirectory(name.to_string())),
            (Some(_), None) => Err(FsError::NotFound(name.to_string())),
        }
    }
}
