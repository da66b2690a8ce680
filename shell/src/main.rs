mod cli;

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use clap::Parser;
use cli::{Cli, Command};
use log::info;
use sectorfs::io::{FileBlockEmulator, FileBlockEmulatorBuilder};
use sectorfs::{FileSystem, FsError};

/// Bytes moved per read or write when copying file contents.
const TRANSFER_SIZE: usize = 10;

fn open_device(cli: &Cli) -> io::Result<FileBlockEmulator> {
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(cli.format)
        .open(&cli.disk)?;

    FileBlockEmulatorBuilder::from(fd)
        .with_sector_count(cli.sectors)
        .clear_medium(cli.format)
        .build()
}

fn put(fs: &mut FileSystem<FileBlockEmulator>, from: &Path, to: &str) -> Result<(), FsError> {
    let data = fs::read(from)?;
    fs.create(to, data.len())?;

    let id = fs.open_file(to)?;
    for chunk in data.chunks(TRANSFER_SIZE) {
        if fs.write_file(id, chunk)? < chunk.len() {
            break;
        }
    }
    fs.close_file(id)
}

fn cat(fs: &mut FileSystem<FileBlockEmulator>, name: &str) -> Result<(), FsError> {
    let id = fs.open_file(name)?;
    let mut stdout = io::stdout().lock();
    let mut buf = [0; TRANSFER_SIZE];
    loop {
        let n = fs.read_file(id, &mut buf)?;
        if n == 0 {
            break;
        }
        stdout.write_all(&buf[..n])?;
    }
    stdout.flush()?;
    fs.close_file(id)
}

fn main() -> Result<(), FsError> {
    env_logger::init();
    let cli = Cli::parse();
    info!("disk={:?} sectors={}", cli.disk, cli.sectors);

    let mut fs = FileSystem::new(open_device(&cli)?, cli.format)?;

    match &cli.command {
        Some(Command::Put { from, to }) => put(&mut fs, from, to)?,
        Some(Command::Cat { name }) => cat(&mut fs, name)?,
        Some(Command::Touch { name, size }) => fs.create(name, *size)?,
        Some(Command::Mkdir { name }) => fs.create_directory(name)?,
        Some(Command::Rm { name, recursive }) => {
            if *recursive {
                fs.recursive_remove(name)?
            } else {
                fs.remove(name)?
            }
        }
        Some(Command::Ls { name, recursive }) => {
            let listing = if *recursive {
                fs.recursive_list(name)?
            } else {
                fs.list(name)?
            };
            for entry in listing {
                println!("{}", entry);
            }
        }
        Some(Command::Dump) => print!("{}", fs.print()?),
        Some(Command::Hdr { name }) => println!("{}", fs.header_size(name)?),
        None => {}
    }

    fs.shutdown().map(drop)
}
