use tracing::debug;

use crate::consts::{BlockPointer, InodePointer, INODES_PER_BLOCK};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::structure::alloc_map::AllocationMap;
use crate::structure::inode::{self, Inode};
use crate::structure::superblock::Layout;
use crate::structure::Structure;
use crate::util::error::{Error, MapKind, Result};
use crate::util::mode::ModeBits;
use crate::util::serializable::{ByteSerializable, KnownSize};

/// The inode table region plus the inode allocation map that guards it.
pub struct InodeTable {
    map: AllocationMap,
    table_index: BlockPointer,
    pub(crate) inode_count: u32,
}

impl InodeTable {
    /// Writes an all-free map and an all-invalid table.
    pub fn create<A: DeviceDriver>(io: &mut IO<A>, layout: &Layout) -> Result<InodeTable> {
        let map = AllocationMap::new(
            MapKind::Inode,
            layout.inode_map_start,
            layout.inode_count,
            io.get_block_size(),
        );
        map.write_full(io)?;
        for i in 0..layout.table_blocks() {
            io.zero_block(layout.table_start + i)?;
        }
        Ok(InodeTable { map, table_index: layout.table_start, inode_count: layout.inode_count })
    }

    pub fn read<A: DeviceDriver>(io: &IO<A>, layout: &Layout) -> Result<InodeTable> {
        let map = AllocationMap::read(io, MapKind::Inode, layout.inode_map_start, layout.inode_count)?;
        Ok(InodeTable { map, table_index: layout.table_start, inode_count: layout.inode_count })
    }

    pub fn map(&self) -> &AllocationMap {
        &self.map
    }

    /// Loads a live inode.
    pub fn get<A: DeviceDriver>(&self, io: &IO<A>, ino: InodePointer) -> Result<Inode> {
        let inode = self.read_record(io, ino)?;
        if !inode.valid {
            return Err(Error::NotFound);
        }
        Ok(inode)
    }

    /// Stamps the modify time and writes the record back. No validity check.
    pub fn put<A: DeviceDriver>(&self, io: &mut IO<A>, inode: &mut Inode) -> Result<()> {
        inode.mtime = inode::now();
        self.write_record(io, inode)
    }

    pub fn allocate<A: DeviceDriver>(&mut self, io: &mut IO<A>, mode: ModeBits) -> Result<Inode> {
        let ino = self.map.allocate(io)?;
        let mut inode = Inode::new(ino, inode::now());
        inode.mode = mode;
        self.write_record(io, &inode)?;
        debug!(ino, mode = format_args!("{:o}", mode), "allocated inode");
        Ok(inode)
    }

    /// Clears the valid flag and returns the ino to the map. The caller has
    /// already released the inode's blocks.
    pub(crate) fn release_record<A: DeviceDriver>(&mut self, io: &mut IO<A>, mut inode: Inode) -> Result<()> {
        inode.valid = false;
        self.put(io, &mut inode)?;
        self.map.free(io, inode.ino)
    }

    fn read_record<A: DeviceDriver>(&self, io: &IO<A>, ino: InodePointer) -> Result<Inode> {
        self.check_range(ino)?;
        let block = io.read_block(self.inode_block(ino))?;
        let offset = Self::inode_offset(ino);
        Ok(Inode::from_bytes(&block[offset..offset + Inode::size_on_disk()]))
    }

    fn write_record<A: DeviceDriver>(&self, io: &mut IO<A>, inode: &Inode) -> Result<()> {
        self.check_range(inode.ino)?;
        let inode_block = self.inode_block(inode.ino);
        let offset = Self::inode_offset(inode.ino);

        let mut block = io.read_block(inode_block)?;
        block[offset..offset + Inode::size_on_disk()].copy_from_slice(&inode.to_bytes());
        io.write_block(inode_block, &block)?;
        Ok(())
    }

    fn check_range(&self, ino: InodePointer) -> Result<()> {
        if ino >= self.inode_count {
            return Err(Error::OutOfRange(ino));
        }
        Ok(())
    }

    #[inline]
    fn inode_block(&self, ino: InodePointer) -> BlockPointer {
        self.table_index + ino / INODES_PER_BLOCK as u32
    }

    #[inline]
    fn inode_offset(ino: InodePointer) -> usize {
        (ino as usize % INODES_PER_BLOCK) * Inode::size_on_disk()
    }
}

impl<A: DeviceDriver> Structure<A> {
    pub fn get_inode(&self, ino: InodePointer) -> Result<Inode> {
        self.inode_table.get(&self.io, ino)
    }

    pub fn put_inode(&mut self, inode: &mut Inode) -> Result<()> {
        self.inode_table.put(&mut self.io, inode)
    }

    pub fn allocate_inode(&mut self, mode: ModeBits) -> Result<Inode> {
        self.inode_table.allocate(&mut self.io, mode)
    }

    /// Frees every data and index block the inode owns, then the inode itself.
    pub fn release_inode(&mut self, ino: InodePointer) -> Result<()> {
        let mut inode = self.get_inode(ino)?;
        let freed = inode.num_blocks;
        self.free_blocks_from(&mut inode, 0)?;
        inode.size = 0;
        self.inode_table.release_record(&mut self.io, inode)?;
        debug!(ino, freed, "released inode");
        Ok(())
    }
}
