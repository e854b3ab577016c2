use crate::config::Geometry;
use crate::consts::{BlockPointer, InodePointer, BLOCK_SIZE, INODES_PER_BLOCK, MAGIC};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_u32, write_u32, ByteSerializable, KnownSize};

const FIELD_COUNT: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: u32,
    pub data_block_count: u32,
    pub free_data_blocks: u32,
    pub inode_count: u32,
    pub used_inodes: u32,
    pub free_inodes: u32,
    pub root_inode: InodePointer,
}

impl SuperBlock {
    pub fn new(inode_count: u32, data_block_count: u32) -> SuperBlock {
        SuperBlock {
            magic: MAGIC,
            data_block_count,
            free_data_blocks: data_block_count,
            inode_count,
            used_inodes: 0,
            free_inodes: inode_count,
            root_inode: 0,
        }
    }

    /// Reads block 0 and checks the magic value.
    pub fn read<A: DeviceDriver>(io: &IO<A>) -> Result<SuperBlock> {
        let block = io.read_block(0)?;
        let superblock = SuperBlock::from_bytes(&block);
        if superblock.magic != MAGIC {
            return Err(Error::InvalidImage(format!(
                "bad magic {:#x}, expected {:#x}",
                superblock.magic, MAGIC
            )));
        }
        let geometry = Geometry { inode_count: superblock.inode_count, data_block_count: superblock.data_block_count };
        geometry
            .validate()
            .map_err(|message| Error::InvalidImage(format!("bad geometry: {}", message)))?;
        if superblock.root_inode >= superblock.inode_count {
            return Err(Error::InvalidImage(format!(
                "root inode {} out of range",
                superblock.root_inode
            )));
        }
        Ok(superblock)
    }

    pub fn write<A: DeviceDriver>(&self, io: &mut IO<A>) -> Result<()> {
        let mut buffer = self.to_bytes();
        buffer.resize(io.get_block_size(), 0);
        io.write_block(0, &buffer)?;
        Ok(())
    }

    pub fn layout(&self) -> Result<Layout> {
        Layout::new(self.inode_count, self.data_block_count)
    }
}

impl ByteSerializable for SuperBlock {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; SuperBlock::size_on_disk()];
        write_u32(&mut buffer, 0, self.magic);
        write_u32(&mut buffer, 4, self.data_block_count);
        write_u32(&mut buffer, 8, self.free_data_blocks);
        write_u32(&mut buffer, 12, self.inode_count);
        write_u32(&mut buffer, 16, self.used_inodes);
        write_u32(&mut buffer, 20, self.free_inodes);
        write_u32(&mut buffer, 24, self.root_inode);
        buffer
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        SuperBlock {
            magic: read_u32(bytes, 0),
            data_block_count: read_u32(bytes, 4),
            free_data_blocks: read_u32(bytes, 8),
            inode_count: read_u32(bytes, 12),
            used_inodes: read_u32(bytes, 16),
            free_inodes: read_u32(bytes, 20),
            root_inode: read_u32(bytes, 24),
        }
    }
}

impl KnownSize for SuperBlock {
    fn size_on_disk() -> usize {
        FIELD_COUNT * 4
    }
}

/// Where each region starts, derived from the geometry in the superblock.
///
/// ```text
/// 0                 superblock
/// 1 ..              inode allocation map
/// data_map_start .. data allocation map
/// table_start ..    inode table
/// data_start ..     data region
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub inode_count: u32,
    pub data_block_count: u32,
    pub inode_map_start: BlockPointer,
    pub data_map_start: BlockPointer,
    pub table_start: BlockPointer,
    pub data_start: BlockPointer,
}

impl Layout {
    /// Fails when the last data block would not have a block number.
    pub fn new(inode_count: u32, data_block_count: u32) -> Result<Layout> {
        let inode_map_start: u64 = 1;
        let data_map_start = inode_map_start + blocks_for(inode_count, BLOCK_SIZE);
        let table_start = data_map_start + blocks_for(data_block_count, BLOCK_SIZE);
        let data_start = table_start + blocks_for(inode_count, INODES_PER_BLOCK);
        let total = data_start + data_block_count as u64;
        if total > BlockPointer::MAX as u64 {
            return Err(Error::InvalidImage(format!(
                "{} inodes and {} data blocks need {} blocks, more than a block number can address",
                inode_count, data_block_count, total
            )));
        }
        Ok(Layout {
            inode_count,
            data_block_count,
            inode_map_start: inode_map_start as BlockPointer,
            data_map_start: data_map_start as BlockPointer,
            table_start: table_start as BlockPointer,
            data_start: data_start as BlockPointer,
        })
    }

    pub fn table_blocks(&self) -> u32 {
        self.data_start - self.table_start
    }
}

fn blocks_for(items: u32, per_block: usize) -> u64 {
    (items as u64).div_ceil(per_block as u64)
}
