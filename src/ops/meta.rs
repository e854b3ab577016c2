use std::time::SystemTime;

use crate::consts::{InodePointer, BLOCK_SIZE};
use crate::structure::inode::{to_system_time, Inode};
use crate::util::mode::ModeBitsHelper;

pub type UserId = u32;
pub type GroupId = u32;

/// Owner reported for every inode. The image stores no ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Owner {
    pub uid: UserId,
    pub gid: GroupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

impl FileKind {
    pub fn of(inode: &Inode) -> FileKind {
        if inode.is_directory() {
            FileKind::Directory
        } else {
            FileKind::File
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub ino: InodePointer,
    pub kind: FileKind,
    pub perm: u16,
    pub size: u64,
    /// Data blocks held by the file.
    pub blocks: u64,
    pub nlink: u32,
    pub uid: UserId,
    pub gid: GroupId,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub block_size: u32,
}

impl Attributes {
    pub fn new(inode: &Inode, owner: Owner) -> Attributes {
        Attributes {
            ino: inode.ino,
            kind: FileKind::of(inode),
            perm: inode.mode.get_permissions(),
            size: inode.size as u64,
            blocks: inode.num_blocks as u64,
            nlink: inode.nlink,
            uid: owner.uid,
            gid: owner.gid,
            atime: to_system_time(inode.atime),
            mtime: to_system_time(inode.mtime),
            ctime: to_system_time(inode.ctime),
            block_size: BLOCK_SIZE as u32,
        }
    }
}

/// A directory entry with the kind of the inode it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub ino: InodePointer,
    pub name: String,
    pub kind: FileKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStats {
    pub blocks: u64,
    pub free_blocks: u64,
    pub files: u64,
    pub free_files: u64,
    pub block_size: u32,
    pub name_max: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::mode::{IS_DIR, IS_FILE};

    #[test]
    fn attributes_from_inode() {
        let mut inode = Inode::new(3, 1_000);
        inode.mode = IS_FILE | 0o640;
        inode.size = 600;
        inode.num_blocks = 2;
        inode.nlink = 1;

        let attributes = Attributes::new(&inode, Owner { uid: 1000, gid: 100 });
        assert_eq!(attributes.kind, FileKind::File);
        assert_eq!(attributes.perm, 0o640);
        assert_eq!(attributes.size, 600);
        assert_eq!(attributes.blocks, 2);
        assert_eq!(attributes.uid, 1000);
        assert_eq!(attributes.mtime, to_system_time(1_000));
        assert_eq!(attributes.block_size, 512);

        inode.mode = IS_DIR | 0o755;
        assert_eq!(FileKind::of(&inode), FileKind::Directory);
    }
}
