use tracing::trace;

use crate::consts::{BlockPointer, MAP_FREE, MAP_USED};
use crate::driver::DeviceDriver;
use crate::io::IO;
use crate::util::error::{Error, MapKind, Result};

/// Free/used status for every inode or every data block, one byte per item.
///
/// The in-memory copy is authoritative while mounted; every change is written
/// through to the block that holds the changed byte.
pub struct AllocationMap {
    kind: MapKind,
    first_block: BlockPointer,
    count: u32,
    free: u32,
    data: Vec<u8>,
}

impl AllocationMap {
    /// An all-free map, not yet persisted.
    pub fn new(kind: MapKind, first_block: BlockPointer, count: u32, block_size: usize) -> AllocationMap {
        let data = vec![MAP_FREE; AllocationMap::padded_len(count, block_size)];
        AllocationMap { kind, first_block, count, free: count, data }
    }

    pub fn read<A: DeviceDriver>(
        io: &IO<A>,
        kind: MapKind,
        first_block: BlockPointer,
        count: u32,
    ) -> Result<AllocationMap> {
        let block_size = io.get_block_size();
        let mut data = vec![0u8; AllocationMap::padded_len(count, block_size)];
        for (i, chunk) in data.chunks_mut(block_size).enumerate() {
            chunk.copy_from_slice(&io.read_block(first_block + i as u32)?);
        }
        let free = data[..count as usize].iter().filter(|&&b| b == MAP_FREE).count() as u32;
        Ok(AllocationMap { kind, first_block, count, free, data })
    }

    fn padded_len(count: u32, block_size: usize) -> usize {
        let count = count as usize;
        ((count + block_size - 1) / block_size).max(1) * block_size
    }

    pub fn write_full<A: DeviceDriver>(&self, io: &mut IO<A>) -> Result<()> {
        let block_size = io.get_block_size();
        for (i, chunk) in self.data.chunks(block_size).enumerate() {
            io.write_block(self.first_block + i as u32, chunk)?;
        }
        Ok(())
    }

    fn write_part<A: DeviceDriver>(&self, io: &mut IO<A>, including_index: u32) -> Result<()> {
        let block_size = io.get_block_size();
        let block = including_index as usize / block_size;
        let chunk = &self.data[block * block_size..(block + 1) * block_size];
        io.write_block(self.first_block + block as u32, chunk)?;
        Ok(())
    }

    /// Hands out the lowest free index.
    pub fn allocate<A: DeviceDriver>(&mut self, io: &mut IO<A>) -> Result<u32> {
        let index = self.data[..self.count as usize]
            .iter()
            .position(|&b| b == MAP_FREE)
            .ok_or(Error::NoSpace(self.kind))? as u32;
        self.set(io, index, MAP_USED)?;
        trace!(map = %self.kind, index, "allocated");
        Ok(index)
    }

    pub fn free<A: DeviceDriver>(&mut self, io: &mut IO<A>, index: u32) -> Result<()> {
        self.check_range(index)?;
        if self.is_free(index) {
            return Err(Error::DoubleFree { map: self.kind, index });
        }
        self.set(io, index, MAP_FREE)?;
        trace!(map = %self.kind, index, "freed");
        Ok(())
    }

    /// Marks an index used without handing it out; used for reserved items.
    pub fn mark_used<A: DeviceDriver>(&mut self, io: &mut IO<A>, index: u32) -> Result<()> {
        self.check_range(index)?;
        if self.is_free(index) {
            self.set(io, index, MAP_USED)?;
        }
        Ok(())
    }

    pub fn is_free(&self, index: u32) -> bool {
        index < self.count && self.data[index as usize] == MAP_FREE
    }

    pub fn free_count(&self) -> u32 {
        self.free
    }

    pub fn used_count(&self) -> u32 {
        self.count - self.free
    }

    fn check_range(&self, index: u32) -> Result<()> {
        if index >= self.count {
            return Err(Error::CorruptEntry {
                block: self.first_block,
                detail: format!("{} map index {} beyond {}", self.kind, index, self.count),
            });
        }
        Ok(())
    }

    fn set<A: DeviceDriver>(&mut self, io: &mut IO<A>, index: u32, value: u8) -> Result<()> {
        let slot = &mut self.data[index as usize];
        if *slot == value {
            return Ok(());
        }
        match value {
            MAP_FREE => self.free += 1,
            _ => self.free -= 1,
        }
        *slot = value;
        self.write_part(io, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MemoryDrive;

    fn io() -> IO<MemoryDrive> {
        IO::new(MemoryDrive::new(512)).unwrap()
    }

    #[test]
    fn read_write() {
        let mut io = io();
        let mut map = AllocationMap::new(MapKind::Data, 1, 1024, 512);
        map.write_full(&mut io).unwrap();
        map.allocate(&mut io).unwrap();
        map.mark_used(&mut io, 700).unwrap();

        let read = AllocationMap::read(&io, MapKind::Data, 1, 1024).unwrap();
        assert_eq!(map.data, read.data);
        assert_eq!(read.used_count(), 2);
        assert!(!read.is_free(700));
    }

    #[test]
    fn allocate_lowest_first() {
        let mut io = io();
        let mut map = AllocationMap::new(MapKind::Inode, 1, 8, 512);
        map.write_full(&mut io).unwrap();

        assert_eq!(map.allocate(&mut io).unwrap(), 0);
        assert_eq!(map.allocate(&mut io).unwrap(), 1);
        assert_eq!(map.allocate(&mut io).unwrap(), 2);
        map.free(&mut io, 1).unwrap();
        assert!(map.is_free(1));
        assert_eq!(map.allocate(&mut io).unwrap(), 1);
        assert_eq!(map.free_count(), 5);
    }

    #[test]
    fn exhaustion() {
        let mut io = io();
        let mut map = AllocationMap::new(MapKind::Inode, 1, 2, 512);
        map.allocate(&mut io).unwrap();
        map.allocate(&mut io).unwrap();
        assert!(matches!(map.allocate(&mut io), Err(Error::NoSpace(MapKind::Inode))));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut io = io();
        let mut map = AllocationMap::new(MapKind::Data, 1, 16, 512);
        let index = map.allocate(&mut io).unwrap();
        map.free(&mut io, index).unwrap();
        assert!(matches!(
            map.free(&mut io, index),
            Err(Error::DoubleFree { map: MapKind::Data, index: 0 })
        ));
        assert!(map.free(&mut io, 99).is_err());
    }

    #[test]
    fn bytes_on_disk() {
        let mut io = io();
        let mut map = AllocationMap::new(MapKind::Data, 1, 600, 512);
        map.write_full(&mut io).unwrap();
        map.mark_used(&mut io, 513).unwrap();

        let second = io.read_block(2).unwrap();
        assert_eq!(second[0], MAP_FREE);
        assert_eq!(second[1], MAP_USED);
        assert_eq!(io.read_block(1).unwrap(), vec![MAP_FREE; 512]);
    }
}
