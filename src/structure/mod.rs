use tracing::{info, warn};

use crate::config::Geometry;
use crate::consts::{BlockPointer, InodePointer, BLOCK_SIZE, NULL_POINTER};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::structure::alloc_map::AllocationMap;
use crate::structure::inode_table::InodeTable;
use crate::structure::superblock::{Layout, SuperBlock};
use crate::util::error::{Error, MapKind, Result};
use crate::util::format::ByteSize;
use crate::util::mode::IS_DIR;

pub mod addressing;
pub mod alloc_map;
pub mod directory;
pub mod inode;
pub mod inode_table;
pub mod path;
pub mod superblock;

/// Everything a mounted image needs, created at mount and consumed at unmount.
pub struct Structure<A: DeviceDriver> {
    pub(crate) io: IO<A>,
    pub(crate) superblock: SuperBlock,
    pub(crate) layout: Layout,
    pub(crate) inode_table: InodeTable,
    pub(crate) data_map: AllocationMap,
}

impl<A: DeviceDriver> Structure<A> {
    /// Formats a device of length zero, or mounts one that already holds an
    /// image. A device whose size cannot be read is never formatted.
    pub fn open(io: IO<A>, geometry: Geometry) -> Result<Structure<A>> {
        if io.is_empty()? {
            Structure::format(io, geometry)
        } else {
            Structure::mount(io)
        }
    }

    pub fn format(mut io: IO<A>, geometry: Geometry) -> Result<Structure<A>> {
        geometry.validate().map_err(Error::InvalidImage)?;
        let layout = Layout::new(geometry.inode_count, geometry.data_block_count)?;

        let inode_table = InodeTable::create(&mut io, &layout)?;
        let mut data_map =
            AllocationMap::new(MapKind::Data, layout.data_map_start, layout.data_block_count, BLOCK_SIZE);
        data_map.write_full(&mut io)?;
        data_map.mark_used(&mut io, NULL_POINTER)?;

        let superblock = SuperBlock::new(geometry.inode_count, geometry.data_block_count);
        let mut structure = Structure { io, superblock, layout, inode_table, data_map };

        let mut root = structure.allocate_inode(IS_DIR | 0o755)?;
        root.nlink = 2;
        structure.put_inode(&mut root)?;
        structure.superblock.root_inode = root.ino;
        structure.sync()?;

        info!(
            inodes = geometry.inode_count,
            data_blocks = geometry.data_block_count,
            capacity = %ByteSize(geometry.data_block_count as u64 * BLOCK_SIZE as u64),
            "formatted new image"
        );
        Ok(structure)
    }

    pub fn mount(io: IO<A>) -> Result<Structure<A>> {
        let superblock = SuperBlock::read(&io)?;
        let layout = superblock.layout()?;
        let needed = layout.data_start as u64 * io.get_block_size() as u64;
        let size = io.get_size()?;
        if size < needed {
            return Err(Error::InvalidImage(format!(
                "image is {} bytes but its maps and inode table need {}",
                size, needed
            )));
        }
        let inode_table = InodeTable::read(&io, &layout)?;
        let data_map = AllocationMap::read(&io, MapKind::Data, layout.data_map_start, layout.data_block_count)?;

        let mut structure = Structure { io, superblock, layout, inode_table, data_map };
        let root = structure
            .get_inode(structure.superblock.root_inode)
            .map_err(|e| Error::InvalidImage(format!("root inode unreadable: {}", e)))?;
        if !root.is_directory() {
            return Err(Error::InvalidImage("root inode is not a directory".to_string()));
        }

        let stored = structure.superblock.clone();
        structure.refresh_counters();
        if stored != structure.superblock {
            warn!(
                stored_free_blocks = stored.free_data_blocks,
                free_blocks = structure.superblock.free_data_blocks,
                stored_used_inodes = stored.used_inodes,
                used_inodes = structure.superblock.used_inodes,
                "superblock counters disagree with the allocation maps"
            );
        }

        info!(
            inodes = layout.inode_count,
            used_inodes = structure.superblock.used_inodes,
            data_blocks = layout.data_block_count,
            free_space = %ByteSize(structure.superblock.free_data_blocks as u64 * BLOCK_SIZE as u64),
            "mounted existing image"
        );
        Ok(structure)
    }

    /// Writes fresh counters into the superblock and flushes the device.
    pub fn sync(&mut self) -> Result<()> {
        self.refresh_counters();
        self.superblock.write(&mut self.io)?;
        self.io.flush()?;
        Ok(())
    }

    fn refresh_counters(&mut self) {
        let inodes = self.inode_table.map();
        self.superblock.used_inodes = inodes.used_count();
        self.superblock.free_inodes = inodes.free_count();
        self.superblock.free_data_blocks = self.data_map.free_count();
    }

    pub fn root_ino(&self) -> InodePointer {
        self.superblock.root_inode
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn data_map(&self) -> &AllocationMap {
        &self.data_map
    }

    pub fn inode_map(&self) -> &AllocationMap {
        self.inode_table.map()
    }

    pub fn into_device(self) -> A {
        self.io.into_device()
    }

    pub(crate) fn allocate_data_block(&mut self) -> Result<BlockPointer> {
        self.data_map.allocate(&mut self.io)
    }

    pub(crate) fn free_data_block(&mut self, block: BlockPointer) -> Result<()> {
        self.check_data_block(block)?;
        self.data_map.free(&mut self.io, block)
    }

    pub(crate) fn read_data_block(&self, block: BlockPointer) -> Result<Vec<u8>> {
        self.check_data_block(block)?;
        Ok(self.io.read_block(self.layout.data_start + block)?)
    }

    pub(crate) fn write_data_block(&mut self, block: BlockPointer, data: &[u8]) -> Result<()> {
        self.check_data_block(block)?;
        self.io.write_block(self.layout.data_start + block, data)?;
        Ok(())
    }

    fn check_data_block(&self, block: BlockPointer) -> Result<()> {
        if block == NULL_POINTER || block >= self.layout.data_block_count {
            return Err(Error::CorruptEntry {
                block,
                detail: format!("data block {} outside 1..{}", block, self.layout.data_block_count),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io;

    use super::*;
    use crate::driver::MemoryDrive;
    use crate::util::serializable::read_u32;

    pub(crate) fn small() -> Geometry {
        Geometry { inode_count: 32, data_block_count: 1024 }
    }

    pub(crate) fn formatted() -> Structure<MemoryDrive> {
        let io = IO::new(MemoryDrive::new(512)).unwrap();
        Structure::open(io, small()).unwrap()
    }

    #[test]
    fn format_empty_device() {
        let structure = formatted();
        let root = structure.get_inode(structure.root_ino()).unwrap();
        assert_eq!(structure.root_ino(), 0);
        assert!(root.is_directory());
        assert_eq!(root.nlink, 2);
        assert_eq!(root.size, 0);
        assert_eq!(structure.inode_map().used_count(), 1);
        // only the reserved block
        assert_eq!(structure.data_map().used_count(), 1);
        assert!(!structure.data_map().is_free(0));
    }

    #[test]
    fn superblock_on_disk() {
        let structure = formatted();
        let device = structure.into_device();
        let block = &device.as_bytes()[..512];
        assert_eq!(read_u32(block, 0), 518);
        assert_eq!(read_u32(block, 4), 1024);
        assert_eq!(read_u32(block, 8), 1023);
        assert_eq!(read_u32(block, 12), 32);
        assert_eq!(read_u32(block, 16), 1);
        assert_eq!(read_u32(block, 20), 31);
        assert_eq!(read_u32(block, 24), 0);
    }

    #[test]
    fn remount_keeps_geometry() {
        let device = formatted().into_device();
        let io = IO::new(device).unwrap();
        // requested geometry is ignored for an existing image
        let structure = Structure::open(io, Geometry::default()).unwrap();
        assert_eq!(structure.layout().inode_count, 32);
        assert_eq!(structure.layout().data_block_count, 1024);
        assert_eq!(structure.inode_map().used_count(), 1);
    }

    #[test]
    fn foreign_image_is_rejected() {
        let mut io = IO::new(MemoryDrive::new(512)).unwrap();
        io.write_block(0, &vec![0xab; 512]).unwrap();
        assert!(matches!(Structure::open(io, small()), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn stale_counters_are_recomputed() {
        let mut structure = formatted();
        structure.superblock.free_data_blocks = 5;
        structure.superblock.write(&mut structure.io).unwrap();

        let io = IO::new(structure.into_device()).unwrap();
        let structure = Structure::mount(io).unwrap();
        assert_eq!(structure.superblock.free_data_blocks, 1023);
    }

    #[test]
    fn data_block_bounds() {
        let structure = formatted();
        assert!(matches!(structure.read_data_block(0), Err(Error::CorruptEntry { .. })));
        assert!(matches!(structure.read_data_block(1024), Err(Error::CorruptEntry { .. })));
        assert_eq!(structure.read_data_block(1).unwrap(), vec![0; 512]);
    }

    /// Fails every size query, as an `fstat` error would.
    struct SizeUnknown<'a>(&'a mut MemoryDrive);

    impl DeviceDriver for SizeUnknown<'_> {
        fn get_sector_size(&self) -> usize {
            self.0.get_sector_size()
        }

        fn get_size(&self) -> io::Result<u64> {
            Err(io::Error::new(io::ErrorKind::Other, "metadata unavailable"))
        }

        fn read_sector(&self, index: u64) -> io::Result<Vec<u8>> {
            self.0.read_sector(index)
        }

        fn write_sector(&mut self, index: u64, data: &[u8]) -> io::Result<()> {
            self.0.write_sector(index, data)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.0.flush()
        }
    }

    #[test]
    fn unknown_size_is_not_formatted() {
        let mut device = formatted().into_device();
        let before = device.as_bytes().to_vec();

        let io = IO::new(SizeUnknown(&mut device)).unwrap();
        assert!(matches!(Structure::open(io, small()), Err(Error::Io(_))));
        assert_eq!(device.as_bytes(), &before[..]);

        let mut blank = MemoryDrive::new(512);
        let io = IO::new(SizeUnknown(&mut blank)).unwrap();
        assert!(matches!(Structure::open(io, small()), Err(Error::Io(_))));
        assert!(blank.as_bytes().is_empty());
    }

    #[test]
    fn oversized_geometry_is_refused() {
        for geometry in [
            Geometry { inode_count: u32::MAX, data_block_count: 2 },
            Geometry { inode_count: 1, data_block_count: u32::MAX },
        ] {
            let io = IO::new(MemoryDrive::new(512)).unwrap();
            assert!(matches!(Structure::open(io, geometry), Err(Error::InvalidImage(_))), "{:?}", geometry);
        }
    }

    #[test]
    fn short_image_is_refused() {
        let device = formatted().into_device();
        let mut io = IO::new(MemoryDrive::new(512)).unwrap();
        // a valid superblock with nothing behind it
        io.write_block(0, &device.as_bytes()[..512]).unwrap();
        assert!(matches!(Structure::open(io, small()), Err(Error::InvalidImage(_))));
    }
}
