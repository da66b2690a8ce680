use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Disk image backing the file system
    #[arg(long, short, default_value = "DISK")]
    pub disk: PathBuf,

    /// Number of sectors on the disk
    #[arg(long, short, default_value_t = 1024)]
    pub sectors: usize,

    /// Format the disk before running the command
    #[arg(long, short)]
    pub format: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Copy a host file into the file system
    Put { from: PathBuf, to: String },
    /// Print a file to stdout
    Cat { name: String },
    /// Create a zero filled file
    Touch {
        name: String,
        #[arg(default_value_t = 0)]
        size: usize,
    },
    /// Create a directory
    Mkdir { name: String },
    /// Remove a file or an empty directory
    Rm {
        name: String,
        /// Remove a directory and everything below it
        #[arg(long, short)]
        recursive: bool,
    },
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        name: String,
        /// Descend into subdirectories
        #[arg(long, short)]
        recursive: bool,
    },
    /// Dump the bitmap, the root directory and their headers
    Dump,
    /// Print the on-disk header size of a file
    Hdr { name: String },
}
