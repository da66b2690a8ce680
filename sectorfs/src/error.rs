use crate::fd::OpenFileId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("{0:?} already exists")]
    AlreadyExists(String),
    #[error("found no file at {0:?}")]
    NotFound(String),
    #[error("no free sectors left on disk")]
    NoSpace,
    #[error("no free entry left in directory")]
    DirectoryFull,
    #[error("invalid file descriptor {0}")]
    InvalidDescriptor(OpenFileId),
    #[error("all file descriptors are in use")]
    TooManyOpenFiles,
    #[error("invalid name: {0:?}")]
    InvalidName(String),
    #[error("{0:?} is not a directory")]
    NotADirectory(String),
    #[error("directory {0:?} is not empty")]
    DirectoryNotEmpty(String),
    #[error("{0:?} is open")]
    FileInUse(String),
    #[error("invalid file system layout: {0}")]
    Corrupt(String),
    #[error("disk i/o failed")]
    Io(#[from] std::io::Error),
}
