use sectorfs::io::FileBlockEmulatorBuilder;
use sectorfs::FileSystem;

pub fn main() {
    let tmp = tempfile::tempfile().unwrap();
    let dev = FileBlockEmulatorBuilder::from(tmp)
        .with_sector_count(64)
        .build()
        .expect("Could not initialize disk emulator.");

    // format a new file system on the device and write a greeting
    let mut fs = FileSystem::format(dev).expect("should format");
    fs.create_directory("home").unwrap();
    fs.create("home/hello", 13).unwrap();

    let id = fs.open_file("home/hello").unwrap();
    fs.write_file(id, b"Hello, world!").unwrap();
    fs.close_file(id).unwrap();

    for entry in fs.recursive_list("").unwrap() {
        println!("{}", entry);
    }
    print!("{}", fs.print().unwrap());
    fs.shutdown().unwrap();
}
