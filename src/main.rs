use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use sfs::config::{Geometry, MountConfig};
use sfs::consts::{DEFAULT_DATA_BLOCK_COUNT, DEFAULT_INODE_COUNT};

/// Serve a block image as a filesystem through FUSE.
#[derive(Debug, Parser)]
#[command(name = "sfs", version)]
struct Args {
    /// Backing image; created and formatted when missing or empty
    image: PathBuf,
    mountpoint: PathBuf,
    /// Mount options, comma separated
    #[arg(short = 'o', value_delimiter = ',')]
    options: Vec<String>,
    /// Inodes in a newly formatted image
    #[arg(long, default_value_t = DEFAULT_INODE_COUNT)]
    inodes: u32,
    /// Data blocks in a newly formatted image
    #[arg(long, default_value_t = DEFAULT_DATA_BLOCK_COUNT)]
    data_blocks: u32,
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = MountConfig::new(args.image, args.mountpoint);
    config.geometry = Geometry { inode_count: args.inodes, data_block_count: args.data_blocks };
    config.options = args.options;
    if let Err(message) = config.geometry.validate() {
        error!(%message, "invalid geometry");
        return ExitCode::FAILURE;
    }

    match sfs::fuse::mount(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, image = %config.image.display(), "mount failed");
            ExitCode::FAILURE
        }
    }
}
