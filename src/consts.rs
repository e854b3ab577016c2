pub(crate) const BLOCK_SIZE: usize = 512;

pub(crate) const DIRECT_POINTERS: usize = 16;
pub(crate) const SINGLE_INDIRECT: usize = DIRECT_POINTERS;
pub(crate) const DOUBLE_INDIRECT: usize = DIRECT_POINTERS + 1;
pub(crate) const TOTAL_POINTERS: usize = DIRECT_POINTERS + 2;

/// Block numbers held by one index block.
pub(crate) const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / 4;

/// Logical blocks reachable through the direct, single-indirect and
/// double-indirect zones together.
pub const MAX_FILE_BLOCKS: u64 = (DIRECT_POINTERS
    + POINTERS_PER_BLOCK
    + POINTERS_PER_BLOCK * POINTERS_PER_BLOCK) as u64;
pub const MAX_FILE_SIZE: u64 = MAX_FILE_BLOCKS * BLOCK_SIZE as u64;

pub(crate) const INODE_SIZE: usize = 9 * 4 + TOTAL_POINTERS * 4;
pub(crate) const INODES_PER_BLOCK: usize = BLOCK_SIZE / INODE_SIZE;

pub(crate) const NAME_LENGTH: usize = 32;
/// Longest storable name; the name field always keeps one NUL.
pub const MAX_NAME_LENGTH: usize = NAME_LENGTH - 1;
pub(crate) const DIRENTRY_SIZE: usize = 64;
pub(crate) const DIRENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIRENTRY_SIZE;

pub(crate) const MAGIC: u32 = 518;

// One byte per item in both allocation maps.
pub(crate) const MAP_USED: u8 = b'0';
pub(crate) const MAP_FREE: u8 = b'1';

/// Data block 0 is reserved at format time so a zero pointer means "unmapped".
pub(crate) const NULL_POINTER: BlockPointer = 0;

pub const DEFAULT_INODE_COUNT: u32 = 256;
pub const MAX_INODE_COUNT: u32 = 1 << 24;
pub const DEFAULT_DATA_BLOCK_COUNT: u32 = 32 * 1024;

pub type BlockPointer = u32;
pub type InodePointer = u32;
pub type Pointers = [BlockPointer; TOTAL_POINTERS];
