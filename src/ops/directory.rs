use tracing::debug;

use crate::consts::InodePointer;
use crate::driver::DeviceDriver;
use crate::ops::file::{link_new, parent_for_new};
use crate::ops::meta::{Entry, FileKind};
use crate::structure::inode::Inode;
use crate::structure::Structure;
use crate::util::error::{Error, Result};
use crate::util::mode::{ModeBits, ModeBitsHelper};

/// Loads a directory, refusing regular files.
pub(crate) fn get_directory<D: DeviceDriver>(structure: &Structure<D>, ino: InodePointer) -> Result<Inode> {
    let inode = structure.get_inode(ino)?;
    if !inode.is_directory() {
        return Err(Error::NotADirectory);
    }
    Ok(inode)
}

pub(crate) fn mkdir<D: DeviceDriver>(
    structure: &mut Structure<D>,
    parent: InodePointer,
    name: &str,
    mode: ModeBits,
) -> Result<Inode> {
    let mut dir = parent_for_new(structure, parent, name)?;
    let inode = link_new(structure, &mut dir, name, mode.as_directory(), 2)?;
    dir.nlink += 1;
    structure.put_inode(&mut dir)?;
    debug!(parent, name, ino = inode.ino, "created directory");
    Ok(inode)
}

pub(crate) fn rmdir<D: DeviceDriver>(structure: &mut Structure<D>, parent: InodePointer, name: &str) -> Result<()> {
    let mut dir = structure.get_inode(parent)?;
    let ino = structure.dir_lookup(&dir, name)?;
    if ino == structure.root_ino() {
        return Err(Error::PermissionDenied);
    }
    let target = get_directory(structure, ino)?;
    if target.size > 0 {
        return Err(Error::NotEmpty);
    }

    structure.dir_remove(&mut dir, ino)?;
    structure.release_inode(ino)?;
    dir.nlink = dir.nlink.saturating_sub(1);
    structure.put_inode(&mut dir)?;
    debug!(parent, name, ino, "removed directory");
    Ok(())
}

pub(crate) fn readdir<D: DeviceDriver>(structure: &Structure<D>, ino: InodePointer) -> Result<Vec<Entry>> {
    let dir = get_directory(structure, ino)?;
    structure
        .dir_entries(&dir)?
        .into_iter()
        .map(|entry| {
            let kind = FileKind::of(&structure.get_inode(entry.ino)?);
            Ok(Entry { ino: entry.ino, name: entry.name, kind })
        })
        .collect()
}
