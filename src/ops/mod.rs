use parking_lot::RwLock;
use tracing::{info, trace};

use crate::config::Geometry;
use crate::consts::{InodePointer, BLOCK_SIZE, MAX_NAME_LENGTH};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::ops::meta::{Attributes, Entry, FsStats, Owner};
use crate::structure::inode::Inode;
use crate::structure::Structure;
use crate::util::error::{Error, Result};
use crate::util::mode::ModeBits;

mod directory;
mod file;
pub mod meta;

/// A mounted image.
///
/// Mutations hold the write lock from start to finish; lookups and reads
/// share the read lock. Every operation comes in an inode-addressed form and
/// a path-addressed one.
pub struct SimpleFs<D: DeviceDriver> {
    structure: RwLock<Structure<D>>,
    owner: Owner,
}

impl<D: DeviceDriver> SimpleFs<D> {
    /// Formats an empty device with `geometry`, or mounts the image on it.
    pub fn mount(device: D, geometry: Geometry, owner: Owner) -> Result<SimpleFs<D>> {
        let io = IO::new(device)?;
        let structure = Structure::open(io, geometry)?;
        Ok(SimpleFs { structure: RwLock::new(structure), owner })
    }

    /// Writes back the superblock counters and returns the device.
    pub fn unmount(self) -> Result<D> {
        let mut structure = self.structure.into_inner();
        structure.sync()?;
        info!(
            used_inodes = structure.superblock.used_inodes,
            free_data_blocks = structure.superblock.free_data_blocks,
            "unmounted"
        );
        Ok(structure.into_device())
    }

    pub fn sync(&self) -> Result<()> {
        self.structure.write().sync()
    }

    pub fn root(&self) -> InodePointer {
        self.structure.read().root_ino()
    }

    fn attributes(&self, inode: &Inode) -> Attributes {
        Attributes::new(inode, self.owner)
    }

    pub fn getattr(&self, ino: InodePointer) -> Result<Attributes> {
        Ok(self.attributes(&self.structure.read().get_inode(ino)?))
    }

    pub fn lookup(&self, parent: InodePointer, name: &str) -> Result<Attributes> {
        let structure = self.structure.read();
        let dir = structure.get_inode(parent)?;
        let ino = structure.dir_lookup(&dir, name)?;
        Ok(self.attributes(&structure.get_inode(ino)?))
    }

    pub fn create(&self, parent: InodePointer, name: &str, mode: ModeBits) -> Result<Attributes> {
        let inode = file::create(&mut self.structure.write(), parent, name, mode)?;
        Ok(self.attributes(&inode))
    }

    pub fn mkdir(&self, parent: InodePointer, name: &str, mode: ModeBits) -> Result<Attributes> {
        let inode = directory::mkdir(&mut self.structure.write(), parent, name, mode)?;
        Ok(self.attributes(&inode))
    }

    pub fn unlink(&self, parent: InodePointer, name: &str) -> Result<()> {
        file::unlink(&mut self.structure.write(), parent, name)
    }

    pub fn rmdir(&self, parent: InodePointer, name: &str) -> Result<()> {
        directory::rmdir(&mut self.structure.write(), parent, name)
    }

    pub fn open(&self, ino: InodePointer) -> Result<()> {
        file::get_file(&self.structure.read(), ino).map(|_| ())
    }

    pub fn opendir(&self, ino: InodePointer) -> Result<()> {
        directory::get_directory(&self.structure.read(), ino).map(|_| ())
    }

    /// Nothing is held per open file, so there is nothing to give back.
    pub fn release(&self, ino: InodePointer) {
        trace!(ino, "release");
    }

    pub fn releasedir(&self, ino: InodePointer) {
        trace!(ino, "releasedir");
    }

    pub fn read(&self, ino: InodePointer, offset: u64, size: usize) -> Result<Vec<u8>> {
        let structure = self.structure.read();
        let inode = file::get_file(&structure, ino)?;
        structure.read(&inode, offset, size)
    }

    pub fn write(&self, ino: InodePointer, offset: u64, data: &[u8]) -> Result<usize> {
        file::write(&mut self.structure.write(), ino, offset, data)
    }

    /// Stored entries only; `.` and `..` are not kept on disk.
    pub fn readdir(&self, ino: InodePointer) -> Result<Vec<Entry>> {
        directory::readdir(&self.structure.read(), ino)
    }

    pub fn truncate(&self, ino: InodePointer, size: u64) -> Result<Attributes> {
        let inode = file::truncate(&mut self.structure.write(), ino, size)?;
        Ok(self.attributes(&inode))
    }

    pub fn chmod(&self, ino: InodePointer, mode: ModeBits) -> Result<Attributes> {
        let inode = file::chmod(&mut self.structure.write(), ino, mode)?;
        Ok(self.attributes(&inode))
    }

    pub fn statfs(&self) -> FsStats {
        let structure = self.structure.read();
        let layout = structure.layout();
        FsStats {
            blocks: layout.data_block_count as u64,
            free_blocks: structure.data_map().free_count() as u64,
            files: layout.inode_count as u64,
            free_files: structure.inode_map().free_count() as u64,
            block_size: BLOCK_SIZE as u32,
            name_max: MAX_NAME_LENGTH as u32,
        }
    }

    pub fn getattr_path(&self, path: &str) -> Result<Attributes> {
        let structure = self.structure.read();
        let ino = structure.resolve(path)?;
        Ok(self.attributes(&structure.get_inode(ino)?))
    }

    pub fn create_path(&self, path: &str, mode: ModeBits) -> Result<Attributes> {
        let mut structure = self.structure.write();
        let (parent, name) = structure.resolve_parent(path)?;
        let inode = file::create(&mut structure, parent, name, mode)?;
        Ok(self.attributes(&inode))
    }

    pub fn mkdir_path(&self, path: &str, mode: ModeBits) -> Result<Attributes> {
        let mut structure = self.structure.write();
        let (parent, name) = structure.resolve_parent(path)?;
        let inode = directory::mkdir(&mut structure, parent, name, mode)?;
        Ok(self.attributes(&inode))
    }

    pub fn unlink_path(&self, path: &str) -> Result<()> {
        let mut structure = self.structure.write();
        let (parent, name) = structure.resolve_parent(path)?;
        file::unlink(&mut structure, parent, name)
    }

    pub fn rmdir_path(&self, path: &str) -> Result<()> {
        if path.split('/').all(str::is_empty) {
            return Err(Error::PermissionDenied);
        }
        let mut structure = self.structure.write();
        let (parent, name) = structure.resolve_parent(path)?;
        directory::rmdir(&mut structure, parent, name)
    }

    pub fn open_path(&self, path: &str) -> Result<InodePointer> {
        let structure = self.structure.read();
        let ino = structure.resolve(path)?;
        file::get_file(&structure, ino).map(|inode| inode.ino)
    }

    pub fn opendir_path(&self, path: &str) -> Result<InodePointer> {
        let structure = self.structure.read();
        let ino = structure.resolve(path)?;
        directory::get_directory(&structure, ino).map(|inode| inode.ino)
    }

    pub fn read_path(&self, path: &str, offset: u64, size: usize) -> Result<Vec<u8>> {
        let structure = self.structure.read();
        let inode = file::get_file(&structure, structure.resolve(path)?)?;
        structure.read(&inode, offset, size)
    }

    pub fn write_path(&self, path: &str, offset: u64, data: &[u8]) -> Result<usize> {
        let mut structure = self.structure.write();
        let ino = structure.resolve(path)?;
        file::write(&mut structure, ino, offset, data)
    }

    pub fn readdir_path(&self, path: &str) -> Result<Vec<String>> {
        let structure = self.structure.read();
        let ino = structure.resolve(path)?;
        Ok(directory::readdir(&structure, ino)?.into_iter().map(|entry| entry.name).collect())
    }

    pub fn truncate_path(&self, path: &str, size: u64) -> Result<Attributes> {
        let mut structure = self.structure.write();
        let ino = structure.resolve(path)?;
        let inode = file::truncate(&mut structure, ino, size)?;
        Ok(self.attributes(&inode))
    }
}
