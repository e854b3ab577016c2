use std::path::PathBuf;

use fuser::MountOption;

use crate::consts::{DEFAULT_DATA_BLOCK_COUNT, DEFAULT_INODE_COUNT, MAX_INODE_COUNT};
use crate::structure::superblock::Layout;
use crate::util::error::Error;

pub const DEFAULT_FS_NAME: &str = "sfs";

/// Format-time sizing. An existing image always keeps the geometry recorded
/// in its superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub inode_count: u32,
    pub data_block_count: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry { inode_count: DEFAULT_INODE_COUNT, data_block_count: DEFAULT_DATA_BLOCK_COUNT }
    }
}

impl Geometry {
    pub fn validate(&self) -> Result<(), String> {
        if self.inode_count == 0 {
            return Err("inode count must be at least 1".to_string());
        }
        // data block 0 is reserved, so one usable block needs two
        if self.data_block_count < 2 {
            return Err("data block count must be at least 2".to_string());
        }
        // the inode map and table are held and scanned in memory
        if self.inode_count > MAX_INODE_COUNT {
            return Err(format!("inode count must be at most {}", MAX_INODE_COUNT));
        }
        Layout::new(self.inode_count, self.data_block_count).map(|_| ()).map_err(|e| match e {
            Error::InvalidImage(message) => message,
            other => other.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct MountConfig {
    pub image: PathBuf,
    pub mountpoint: PathBuf,
    pub geometry: Geometry,
    /// Pass-through `-o` options, one option per element.
    pub options: Vec<String>,
}

impl MountConfig {
    pub fn new(image: PathBuf, mountpoint: PathBuf) -> MountConfig {
        MountConfig { image, mountpoint, geometry: Geometry::default(), options: Vec::new() }
    }

    pub fn fuse_options(&self) -> Vec<MountOption> {
        let mut options = Vec::with_capacity(self.options.len() + 1);
        let mut has_name = false;
        for option in self.options.iter().map(|o| o.trim()).filter(|o| !o.is_empty()) {
            let parsed = parse_mount_option(option);
            has_name |= matches!(parsed, MountOption::FSName(_));
            options.push(parsed);
        }
        if !has_name {
            options.push(MountOption::FSName(DEFAULT_FS_NAME.to_string()));
        }
        options
    }
}

fn parse_mount_option(option: &str) -> MountOption {
    match option {
        "ro" => MountOption::RO,
        "rw" => MountOption::RW,
        "allow_other" => MountOption::AllowOther,
        "allow_root" => MountOption::AllowRoot,
        "auto_unmount" => MountOption::AutoUnmount,
        "default_permissions" => MountOption::DefaultPermissions,
        "dev" => MountOption::Dev,
        "nodev" => MountOption::NoDev,
        "suid" => MountOption::Suid,
        "nosuid" => MountOption::NoSuid,
        "exec" => MountOption::Exec,
        "noexec" => MountOption::NoExec,
        "atime" => MountOption::Atime,
        "noatime" => MountOption::NoAtime,
        "sync" => MountOption::Sync,
        "async" => MountOption::Async,
        "dirsync" => MountOption::DirSync,
        other => match other.strip_prefix("fsname=") {
            Some(name) => MountOption::FSName(name.to_string()),
            None => MountOption::CUSTOM(other.to_string()),
        },
    }
}
