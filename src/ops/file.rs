use tracing::debug;

use crate::consts::InodePointer;
use crate::driver::DeviceDriver;
use crate::structure::directory::check_name;
use crate::structure::inode::{self, Inode};
use crate::structure::Structure;
use crate::util::error::{Error, Result};
use crate::util::mode::{ModeBits, ModeBitsHelper};

/// Loads a regular file, refusing directories.
pub(crate) fn get_file<D: DeviceDriver>(structure: &Structure<D>, ino: InodePointer) -> Result<Inode> {
    let inode = structure.get_inode(ino)?;
    if inode.is_directory() {
        return Err(Error::IsADirectory);
    }
    Ok(inode)
}

/// Loads `parent` as a directory and makes sure `name` is free in it.
pub(crate) fn parent_for_new<D: DeviceDriver>(
    structure: &Structure<D>,
    parent: InodePointer,
    name: &str,
) -> Result<Inode> {
    check_name(name)?;
    let dir = structure.get_inode(parent)?;
    match structure.dir_lookup(&dir, name) {
        Ok(_) => Err(Error::AlreadyExists),
        Err(Error::NotFound) => Ok(dir),
        Err(e) => Err(e),
    }
}

/// Allocates an inode and links it into `dir`. The inode is given back to
/// the map if the directory cannot take the entry.
pub(crate) fn link_new<D: DeviceDriver>(
    structure: &mut Structure<D>,
    dir: &mut Inode,
    name: &str,
    mode: ModeBits,
    nlink: u32,
) -> Result<Inode> {
    let mut inode = structure.allocate_inode(mode)?;
    inode.nlink = nlink;
    structure.put_inode(&mut inode)?;
    if let Err(e) = structure.dir_append(dir, name, inode.ino) {
        structure.release_inode(inode.ino)?;
        return Err(e);
    }
    Ok(inode)
}

pub(crate) fn create<D: DeviceDriver>(
    structure: &mut Structure<D>,
    parent: InodePointer,
    name: &str,
    mode: ModeBits,
) -> Result<Inode> {
    let mut dir = parent_for_new(structure, parent, name)?;
    let inode = link_new(structure, &mut dir, name, mode.as_file(), 1)?;
    debug!(parent, name, ino = inode.ino, "created file");
    Ok(inode)
}

pub(crate) fn unlink<D: DeviceDriver>(structure: &mut Structure<D>, parent: InodePointer, name: &str) -> Result<()> {
    let mut dir = structure.get_inode(parent)?;
    let ino = structure.dir_lookup(&dir, name)?;
    get_file(structure, ino)?;
    structure.dir_remove(&mut dir, ino)?;
    structure.release_inode(ino)?;
    debug!(parent, name, ino, "unlinked file");
    Ok(())
}

pub(crate) fn write<D: DeviceDriver>(
    structure: &mut Structure<D>,
    ino: InodePointer,
    offset: u64,
    data: &[u8],
) -> Result<usize> {
    let mut inode = get_file(structure, ino)?;
    structure.write(&mut inode, offset, data)
}

pub(crate) fn truncate<D: DeviceDriver>(structure: &mut Structure<D>, ino: InodePointer, size: u64) -> Result<Inode> {
    let mut inode = get_file(structure, ino)?;
    structure.truncate(&mut inode, size)?;
    debug!(ino, size, blocks = inode.num_blocks, "truncated");
    Ok(inode)
}

/// Replaces the permission bits and keeps the type.
pub(crate) fn chmod<D: DeviceDriver>(structure: &mut Structure<D>, ino: InodePointer, mode: ModeBits) -> Result<Inode> {
    let mut inode = structure.get_inode(ino)?;
    inode.mode = if inode.is_directory() { mode.as_directory() } else { mode.as_file() };
    inode.ctime = inode::now();
    structure.put_inode(&mut inode)?;
    Ok(inode)
}
