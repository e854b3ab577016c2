use std::fs;
use std::os::unix::fs::MetadataExt;

use tracing::info;

use crate::config::MountConfig;
use crate::consts::BLOCK_SIZE;
use crate::driver::FileDrive;
use crate::ops::meta::Owner;
use crate::ops::SimpleFs;
use crate::util::error::Result;

pub mod filesystem;

pub use filesystem::FuseDriver;

/// Opens (or creates) the image, serves it at the mount point and returns
/// once the kernel unmounts it.
pub fn mount(config: &MountConfig) -> Result<()> {
    let device = FileDrive::open(&config.image, BLOCK_SIZE)?;
    let metadata = fs::metadata(&config.image)?;
    // everything in the image is reported as owned by the image's owner
    let owner = Owner { uid: metadata.uid(), gid: metadata.gid() };

    let fs = SimpleFs::mount(device, config.geometry, owner)?;
    let options = config.fuse_options();
    info!(image = %config.image.display(), mountpoint = %config.mountpoint.display(), ?options, "mounting");
    fuser::mount2(FuseDriver::new(fs), &config.mountpoint, &options)?;
    info!(mountpoint = %config.mountpoint.display(), "unmounted");
    Ok(())
}
