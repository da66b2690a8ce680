//! System call entry points.
//!
//! User programs only see integers: create and remove return 1 or 0, open
//! returns a descriptor id or -1, read and write return a byte count or -1 and
//! close returns 1 or -1. The reason for a failure is logged, not returned.

use crate::error::FsError;
use crate::fd::OpenFileId;
use crate::fs::FileSystem;
use crate::io::BlockStorage;

fn report<V>(call: &str, result: Result<V, FsError>) -> Option<V> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            debug!("{} failed: {}", call, err);
            None
        }
    }
}

fn flag<V>(call: &str, result: Result<V, FsError>) -> i32 {
    report(call, result).map_or(0, |_| 1)
}

/// Length of the buffer prefix a call may touch, or `None` when `size` is
/// negative or larger than the buffer.
fn span(size: i32, available: usize) -> Option<usize> {
    usize::try_from(size).ok().filter(|&n| n <= available)
}

pub fn sys_create<T: BlockStorage>(fs: &mut FileSystem<T>, name: &str, size: i32) -> i32 {
    match usize::try_from(size) {
        Ok(size) => flag("create", fs.create(name, size)),
        Err(_) => 0,
    }
}

pub fn sys_create_directory<T: BlockStorage>(fs: &mut FileSystem<T>, name: &str) -> i32 {
    flag("create_directory", fs.create_directory(name))
}

pub fn sys_remove<T: BlockStorage>(fs: &mut FileSystem<T>, name: &str, recursive: bool) -> i32 {
    if recursive {
        flag("recursive_remove", fs.recursive_remove(name))
    } else {
        flag("remove", fs.remove(name))
    }
}

pub fn sys_open<T: BlockStorage>(fs: &mut FileSystem<T>, name: &str) -> OpenFileId {
    report("open", fs.open_file(name)).unwrap_or(-1)
}

pub fn sys_write<T: BlockStorage>(
    fs: &mut FileSystem<T>,
    buffer: &[u8],
    size: i32,
    id: OpenFileId,
) -> i32 {
    let Some(len) = span(size, buffer.len()) else {
        return -1;
    };
    report("write", fs.write_file(id, &buffer[..len])).map_or(-1, |n| n as i32)
}

pub fn sys_read<T: BlockStorage>(
    fs: &mut FileSystem<T>,
    buffer: &mut [u8],
    size: i32,
    id: OpenFileId,
) -> i32 {
    let Some(len) = span(size, buffer.len()) else {
        return -1;
    };
    report("read", fs.read_file(id, &mut buffer[..len])).map_or(-1, |n| n as i32)
}

pub fn sys_close<T: BlockStorage>(fs: &mut FileSystem<T>, id: OpenFileId) -> i32 {
    report("close", fs.close_file(id)).map_or(-1, |_| 1)
}
