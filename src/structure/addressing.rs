use std::cmp::{max, min};

use tracing::debug;

use crate::consts::{
    BlockPointer, BLOCK_SIZE, DIRECT_POINTERS, DOUBLE_INDIRECT, MAX_FILE_SIZE, NULL_POINTER,
    POINTERS_PER_BLOCK, SINGLE_INDIRECT,
};
use crate::driver::DeviceDriver;
use crate::structure::inode::{self, Inode};
use crate::structure::Structure;
use crate::util::error::{Error, MapKind, Result};
use crate::util::serializable::{read_u32_array, write_u32_array};

const DIRECT: u64 = DIRECT_POINTERS as u64;
const PER_INDEX: u64 = POINTERS_PER_BLOCK as u64;
const BLOCK: u64 = BLOCK_SIZE as u64;

/// Where a logical block's pointer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Zone {
    /// Slot in the inode's direct pointers.
    Direct(usize),
    /// Slot in the single-indirect index block.
    Single(usize),
    /// Slot in the outer index block, then slot in the inner one.
    Double(usize, usize),
}

impl Zone {
    pub(crate) fn locate(logical: u64) -> Result<Zone> {
        if logical < DIRECT {
            Ok(Zone::Direct(logical as usize))
        } else if logical < DIRECT + PER_INDEX {
            Ok(Zone::Single((logical - DIRECT) as usize))
        } else if logical < DIRECT + PER_INDEX + PER_INDEX * PER_INDEX {
            let rest = logical - DIRECT - PER_INDEX;
            Ok(Zone::Double((rest / PER_INDEX) as usize, (rest % PER_INDEX) as usize))
        } else {
            Err(Error::FileTooLarge)
        }
    }
}

impl<A: DeviceDriver> Structure<A> {
    /// Reads up to `size` bytes at `offset`, clamped to the file size.
    /// Unmapped blocks inside the file read as zeros.
    pub fn read(&self, inode: &Inode, offset: u64, size: usize) -> Result<Vec<u8>> {
        let file_size = inode.size as u64;
        if offset >= file_size {
            return Ok(Vec::new());
        }
        let end = min(file_size, offset.saturating_add(size as u64));

        let mut data = Vec::with_capacity((end - offset) as usize);
        let mut position = offset;
        while position < end {
            let inner_start = (position % BLOCK) as usize;
            let chunk = min(BLOCK_SIZE - inner_start, (end - position) as usize);
            match self.map_block(inode, position / BLOCK)? {
                Some(block) => {
                    let buffer = self.read_data_block(block)?;
                    data.extend_from_slice(&buffer[inner_start..inner_start + chunk]);
                }
                None => data.resize(data.len() + chunk, 0),
            }
            position += chunk as u64;
        }
        Ok(data)
    }

    /// Writes `data` at `offset`, growing the file block by block.
    ///
    /// Capacity and free space are checked before anything is touched, so a
    /// failed write leaves the image unchanged.
    pub fn write(&mut self, inode: &mut Inode, offset: u64, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let end = offset.checked_add(data.len() as u64).ok_or(Error::FileTooLarge)?;
        if end > MAX_FILE_SIZE {
            return Err(Error::FileTooLarge);
        }

        let needed = self.blocks_to_allocate(inode, offset / BLOCK, (end - 1) / BLOCK)?;
        if needed > self.data_map.free_count() as u64 {
            return Err(Error::NoSpace(MapKind::Data));
        }

        let mut written = 0;
        let mut position = offset;
        while position < end {
            let inner_start = (position % BLOCK) as usize;
            let chunk = min(BLOCK_SIZE - inner_start, (end - position) as usize);
            let source = &data[written..written + chunk];

            let (block, fresh) = self.map_or_allocate(inode, position / BLOCK)?;
            if chunk == BLOCK_SIZE {
                self.write_data_block(block, source)?;
            } else {
                let mut buffer = if fresh { vec![0; BLOCK_SIZE] } else { self.read_data_block(block)? };
                buffer[inner_start..inner_start + chunk].copy_from_slice(source);
                self.write_data_block(block, &buffer)?;
            }

            written += chunk;
            position += chunk as u64;
        }

        inode.size = max(inode.size as u64, end) as u32;
        self.put_inode(inode)?;
        debug!(ino = inode.ino, offset, written, size = inode.size, blocks = inode.num_blocks, "write");
        Ok(written)
    }

    /// Sets the file size. Shrinking releases every block wholly past the new
    /// end and zeroes the rest of the last kept block.
    pub fn truncate(&mut self, inode: &mut Inode, new_size: u64) -> Result<()> {
        if new_size > MAX_FILE_SIZE {
            return Err(Error::FileTooLarge);
        }
        if new_size < inode.size as u64 {
            self.free_blocks_from(inode, (new_size + BLOCK - 1) / BLOCK)?;
            let tail = (new_size % BLOCK) as usize;
            if tail != 0 {
                if let Some(block) = self.map_block(inode, new_size / BLOCK)? {
                    let mut buffer = self.read_data_block(block)?;
                    buffer[tail..].fill(0);
                    self.write_data_block(block, &buffer)?;
                }
            }
        }
        inode.size = new_size as u32;
        inode.ctime = inode::now();
        self.put_inode(inode)
    }

    /// Physical data block behind `logical`, if one is mapped.
    pub(crate) fn map_block(&self, inode: &Inode, logical: u64) -> Result<Option<BlockPointer>> {
        let pointer = match Zone::locate(logical)? {
            Zone::Direct(slot) => inode.pointers[slot],
            Zone::Single(slot) => {
                let index = inode.pointers[SINGLE_INDIRECT];
                if index == NULL_POINTER {
                    return Ok(None);
                }
                self.read_index(index)?[slot]
            }
            Zone::Double(outer, slot) => {
                let root = inode.pointers[DOUBLE_INDIRECT];
                if root == NULL_POINTER {
                    return Ok(None);
                }
                let middle = self.read_index(root)?[outer];
                if middle == NULL_POINTER {
                    return Ok(None);
                }
                self.read_index(middle)?[slot]
            }
        };
        Ok((pointer != NULL_POINTER).then_some(pointer))
    }

    /// Every block the inode owns: data blocks and the index blocks above them.
    pub fn owned_blocks(&self, inode: &Inode) -> Result<Vec<BlockPointer>> {
        let mut blocks: Vec<BlockPointer> =
            inode.pointers[..DIRECT_POINTERS].iter().copied().filter(|&b| b != NULL_POINTER).collect();

        let single = inode.pointers[SINGLE_INDIRECT];
        if single != NULL_POINTER {
            blocks.push(single);
            blocks.extend(self.read_index(single)?.into_iter().filter(|&b| b != NULL_POINTER));
        }

        let root = inode.pointers[DOUBLE_INDIRECT];
        if root != NULL_POINTER {
            blocks.push(root);
            for middle in self.read_index(root)?.into_iter().filter(|&b| b != NULL_POINTER) {
                blocks.push(middle);
                blocks.extend(self.read_index(middle)?.into_iter().filter(|&b| b != NULL_POINTER));
            }
        }
        Ok(blocks)
    }

    /// Releases every mapping for logical blocks `keep..`, zone by zone, and
    /// any index block left with nothing mapped below it.
    pub(crate) fn free_blocks_from(&mut self, inode: &mut Inode, keep: u64) -> Result<()> {
        for slot in (keep.min(DIRECT) as usize)..DIRECT_POINTERS {
            let block = inode.pointers[slot];
            if block != NULL_POINTER {
                self.free_file_block(inode, block)?;
                inode.pointers[slot] = NULL_POINTER;
            }
        }

        let single = inode.pointers[SINGLE_INDIRECT];
        if single != NULL_POINTER {
            let first = keep.saturating_sub(DIRECT).min(PER_INDEX) as usize;
            self.free_index_tail(inode, single, first)?;
            if first == 0 {
                inode.pointers[SINGLE_INDIRECT] = NULL_POINTER;
            }
        }

        let root = inode.pointers[DOUBLE_INDIRECT];
        let first = keep.saturating_sub(DIRECT + PER_INDEX);
        if root != NULL_POINTER && first < PER_INDEX * PER_INDEX {
            let mut middles = self.read_index(root)?;
            let mut changed = false;
            for outer in (first / PER_INDEX) as usize..POINTERS_PER_BLOCK {
                let middle = middles[outer];
                if middle == NULL_POINTER {
                    continue;
                }
                let inner_first = first.saturating_sub(outer as u64 * PER_INDEX).min(PER_INDEX) as usize;
                self.free_index_tail(inode, middle, inner_first)?;
                if inner_first == 0 {
                    middles[outer] = NULL_POINTER;
                    changed = true;
                }
            }
            if first == 0 {
                self.free_data_block(root)?;
                inode.pointers[DOUBLE_INDIRECT] = NULL_POINTER;
            } else if changed {
                self.write_index(root, &middles)?;
            }
        }
        Ok(())
    }

    /// Frees data blocks at `first..` of one index block; the index block
    /// itself goes too when `first` is 0.
    fn free_index_tail(&mut self, inode: &mut Inode, index: BlockPointer, first: usize) -> Result<()> {
        let mut entries = self.read_index(index)?;
        let mut changed = false;
        for slot in first..POINTERS_PER_BLOCK {
            let block = entries[slot];
            if block != NULL_POINTER {
                self.free_file_block(inode, block)?;
                entries[slot] = NULL_POINTER;
                changed = true;
            }
        }
        if first == 0 {
            self.free_data_block(index)
        } else if changed {
            self.write_index(index, &entries)
        } else {
            Ok(())
        }
    }

    /// Counts the data and index blocks a write over `first..=last` would add.
    fn blocks_to_allocate(&self, inode: &Inode, first: u64, last: u64) -> Result<u64> {
        let mut needed = 0;
        let mut single: Option<Vec<BlockPointer>> = None;
        let mut root: Option<Vec<BlockPointer>> = None;
        let mut middle: Option<(usize, Vec<BlockPointer>)> = None;

        for logical in first..=last {
            let slot_value = match Zone::locate(logical)? {
                Zone::Direct(slot) => inode.pointers[slot],
                Zone::Single(slot) => {
                    if single.is_none() {
                        single = Some(self.index_or_blank(inode.pointers[SINGLE_INDIRECT], &mut needed)?);
                    }
                    single.as_ref().map_or(NULL_POINTER, |entries| entries[slot])
                }
                Zone::Double(outer, slot) => {
                    if root.is_none() {
                        root = Some(self.index_or_blank(inode.pointers[DOUBLE_INDIRECT], &mut needed)?);
                    }
                    if middle.as_ref().map(|(position, _)| *position) != Some(outer) {
                        let pointer = root.as_ref().map_or(NULL_POINTER, |entries| entries[outer]);
                        middle = Some((outer, self.index_or_blank(pointer, &mut needed)?));
                    }
                    middle.as_ref().map_or(NULL_POINTER, |(_, entries)| entries[slot])
                }
            };
            if slot_value == NULL_POINTER {
                needed += 1;
            }
        }
        Ok(needed)
    }

    fn index_or_blank(&self, index: BlockPointer, needed: &mut u64) -> Result<Vec<BlockPointer>> {
        if index == NULL_POINTER {
            *needed += 1;
            Ok(vec![NULL_POINTER; POINTERS_PER_BLOCK])
        } else {
            self.read_index(index)
        }
    }

    /// Returns the data block for `logical`, allocating it and any missing
    /// index block on the way. The flag is set for a newly allocated block.
    fn map_or_allocate(&mut self, inode: &mut Inode, logical: u64) -> Result<(BlockPointer, bool)> {
        match Zone::locate(logical)? {
            Zone::Direct(slot) => {
                if inode.pointers[slot] != NULL_POINTER {
                    return Ok((inode.pointers[slot], false));
                }
                let block = self.allocate_file_block(inode)?;
                inode.pointers[slot] = block;
                Ok((block, true))
            }
            Zone::Single(slot) => {
                let index = self.ensure_index(&mut inode.pointers[SINGLE_INDIRECT])?;
                self.map_in_index(inode, index, slot)
            }
            Zone::Double(outer, slot) => {
                let root = self.ensure_index(&mut inode.pointers[DOUBLE_INDIRECT])?;
                let mut middles = self.read_index(root)?;
                let created = middles[outer] == NULL_POINTER;
                let middle = self.ensure_index(&mut middles[outer])?;
                if created {
                    self.write_index(root, &middles)?;
                }
                self.map_in_index(inode, middle, slot)
            }
        }
    }

    fn map_in_index(&mut self, inode: &mut Inode, index: BlockPointer, slot: usize) -> Result<(BlockPointer, bool)> {
        let mut entries = self.read_index(index)?;
        if entries[slot] != NULL_POINTER {
            return Ok((entries[slot], false));
        }
        let block = self.allocate_file_block(inode)?;
        entries[slot] = block;
        self.write_index(index, &entries)?;
        Ok((block, true))
    }

    /// Allocates and zeroes an index block if `slot` is still empty.
    fn ensure_index(&mut self, slot: &mut BlockPointer) -> Result<BlockPointer> {
        if *slot == NULL_POINTER {
            let block = self.allocate_data_block()?;
            self.write_data_block(block, &[0; BLOCK_SIZE])?;
            *slot = block;
        }
        Ok(*slot)
    }

    fn allocate_file_block(&mut self, inode: &mut Inode) -> Result<BlockPointer> {
        let block = self.allocate_data_block()?;
        inode.num_blocks += 1;
        Ok(block)
    }

    fn free_file_block(&mut self, inode: &mut Inode, block: BlockPointer) -> Result<()> {
        self.free_data_block(block)?;
        inode.num_blocks = inode.num_blocks.saturating_sub(1);
        Ok(())
    }

    fn read_index(&self, index: BlockPointer) -> Result<Vec<BlockPointer>> {
        Ok(read_u32_array(&self.read_data_block(index)?))
    }

    fn write_index(&mut self, index: BlockPointer, entries: &[BlockPointer]) -> Result<()> {
        self.write_data_block(index, &write_u32_array(entries))
    }
}
