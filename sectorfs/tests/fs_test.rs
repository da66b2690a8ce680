use tempfile::NamedTempFile;

use sectorfs::io::{FileBlockEmulator, FileBlockEmulatorBuilder};
use sectorfs::syscall::{sys_close, sys_create, sys_open, sys_read, sys_remove, sys_write};
use sectorfs::{FileSystem, FsError, NUM_DIR_ENTRIES};

fn format(sectors: usize) -> FileSystem<FileBlockEmulator> {
    let dev = FileBlockEmulatorBuilder::from(tempfile::tempfile().unwrap())
        .with_sector_count(sectors)
        .build()
        .expect("Could not initialize disk emulator.");
    FileSystem::format(dev).unwrap()
}

fn names(fs: &FileSystem<FileBlockEmulator>, dir: &str) -> Vec<String> {
    fs.list(dir).unwrap().into_iter().map(|e| e.name).collect()
}

#[test]
fn removed_sectors_are_reused() {
    let mut fs = format(32);

    fs.create("x", 100).unwrap();
    let sector = sectorfs::resolve(fs.root_file(), "x").unwrap().target;
    assert!(sector.is_some());
    assert!(matches!(fs.create("x", 50), Err(FsError::AlreadyExists(_))));

    fs.remove("x").unwrap();
    assert!(fs.list("").unwrap().is_empty());

    fs.create("x", 50).unwrap();
    let again = sectorfs::resolve(fs.root_file(), "x").unwrap().target;
    assert_eq!(sector, again);
    assert_eq!(names(&fs, ""), ["x"]);
    assert_eq!(fs.open("x").unwrap().length(), 50);
}

#[test]
fn failed_directory_create_leaves_disk_untouched() {
    let mut fs = format(32);
    fs.create_directory("a").unwrap();
    fs.create_directory("b").unwrap();
    let free = fs.free_sector_count().unwrap();
    assert!(free < 9);

    assert!(matches!(fs.create_directory("c"), Err(FsError::NoSpace)));

    assert_eq!(fs.free_sector_count().unwrap(), free);
    assert_eq!(names(&fs, ""), ["a", "b"]);
}

#[test]
fn full_directory_rejects_new_entries() {
    let mut fs = format(128);
    for i in 0..NUM_DIR_ENTRIES {
        fs.create(&format!("f{}", i), 0).unwrap();
    }
    let free = fs.free_sector_count().unwrap();

    assert!(matches!(fs.create("extra", 0), Err(FsError::DirectoryFull)));
    assert_eq!(fs.free_sector_count().unwrap(), free);

    fs.remove("f7").unwrap();
    fs.create("extra", 0).unwrap();
}

#[test]
fn recursive_remove_returns_every_sector() {
    let mut fs = format(256);
    fs.create("keep", 40).unwrap();
    let before = fs.free_sector_count().unwrap();

    fs.create_directory("a").unwrap();
    fs.create("a/one", 300).unwrap();
    fs.create_directory("a/b").unwrap();
    fs.create("a/b/two", 129).unwrap();
    fs.create_directory("a/b/c").unwrap();
    assert!(matches!(fs.remove("a"), Err(FsError::DirectoryNotEmpty(_))));

    fs.recursive_remove("a").unwrap();

    assert_eq!(fs.free_sector_count().unwrap(), before);
    assert_eq!(names(&fs, ""), ["keep"]);
    assert!(matches!(fs.open("a/one"), Err(FsError::NotFound(_))));
}

#[test]
fn nested_paths_resolve_with_or_without_leading_slash() {
    let mut fs = format(128);
    fs.create_directory("docs").unwrap();
    fs.create_directory("/docs/old").unwrap();
    fs.create("docs/old/a", 10).unwrap();

    assert_eq!(fs.open("/docs/old/a").unwrap().length(), 10);
    assert_eq!(names(&fs, "docs"), ["old"]);
    assert!(matches!(fs.create("nope/a", 10), Err(FsError::NotFound(_))));
    assert!(matches!(fs.create("docs/old/a/b", 10), Err(FsError::NotFound(_))));
}

#[test]
fn contents_survive_remount() {
    let tf = NamedTempFile::new().unwrap();
    let dev = FileBlockEmulatorBuilder::from(tf.reopen().unwrap())
        .with_sector_count(64)
        .build()
        .unwrap();
    let mut fs = FileSystem::format(dev).unwrap();
    fs.create_directory("d").unwrap();
    fs.create("d/f", 11).unwrap();
    let id = fs.open_file("d/f").unwrap();
    fs.write_file(id, b"hello world").unwrap();
    fs.shutdown().unwrap();

    let dev = FileBlockEmulatorBuilder::from(tf.reopen().unwrap())
        .with_sector_count(64)
        .clear_medium(false)
        .build()
        .unwrap();
    let mut fs = FileSystem::mount(dev).unwrap();
    let id = fs.open_file("d/f").unwrap();
    assert_eq!(id, 0);
    let mut buf = [0; 11];
    assert_eq!(fs.read_file(id, &mut buf).unwrap(), 11);
    assert_eq!(&buf, b"hello world");
}

#[test]
fn syscalls_use_integer_results() {
    let mut fs = format(64);

    assert_eq!(sys_create(&mut fs, "f", 5), 1);
    assert_eq!(sys_create(&mut fs, "f", 5), 0);
    let id = sys_open(&mut fs, "f");
    assert_eq!(id, 0);
    assert_eq!(sys_write(&mut fs, b"abcde", 5, id), 5);
    assert_eq!(sys_close(&mut fs, id), 1);
    assert_eq!(sys_close(&mut fs, id), -1);

    let id = sys_open(&mut fs, "f");
    let mut buf = [0; 5];
    assert_eq!(sys_read(&mut fs, &mut buf, 5, id), 5);
    assert_eq!(&buf, b"abcde");

    assert_eq!(sys_remove(&mut fs, "f", false), 0);
    assert_eq!(sys_close(&mut fs, id), 1);
    assert_eq!(sys_remove(&mut fs, "f", false), 1);
    assert_eq!(sys_remove(&mut fs, "f", false), 0);
    assert_eq!(sys_open(&mut fs, "f"), -1);
}

#[test]
fn unformatted_disk_does_not_mount() {
    let tf = NamedTempFile::new().unwrap();
    let dev = FileBlockEmulatorBuilder::from(tf.reopen().unwrap())
        .with_sector_count(64)
        .build()
        .unwrap();

    assert!(FileSystem::new(dev, false).is_err());
}
