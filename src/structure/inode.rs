use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::consts::{InodePointer, Pointers, INODE_SIZE, NULL_POINTER, TOTAL_POINTERS};
use crate::util::mode::{ModeBits, ModeBitsHelper};
use crate::util::serializable::{read_u32, write_u32, ByteSerializable, KnownSize};

const HEADER_SIZE: usize = 9 * 4;

/// Seconds since the epoch, as stored in inode timestamps.
pub type Timestamp = u32;

pub fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as Timestamp)
        .unwrap_or(0)
}

pub fn to_system_time(timestamp: Timestamp) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(timestamp as u64)
}

/// One fixed-width record of the inode table.
///
/// `pointers` holds the direct zone followed by the single-indirect and
/// double-indirect index block numbers. A zero entry is unmapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub valid: bool,
    pub ino: InodePointer,
    pub mode: ModeBits,
    pub size: u32,
    /// Data blocks owned by the file; index blocks are not counted.
    pub num_blocks: u32,
    pub nlink: u32,
    pub atime: Timestamp,
    pub mtime: Timestamp,
    pub ctime: Timestamp,
    pub pointers: Pointers,
}

impl Inode {
    /// A fresh, valid record with every timestamp set to `now`.
    pub fn new(ino: InodePointer, now: Timestamp) -> Inode {
        Inode {
            valid: true,
            ino,
            mode: 0,
            size: 0,
            num_blocks: 0,
            nlink: 0,
            atime: now,
            mtime: now,
            ctime: now,
            pointers: [NULL_POINTER; TOTAL_POINTERS],
        }
    }

    pub fn is_directory(&self) -> bool {
        self.mode.is_directory()
    }
}

impl ByteSerializable for Inode {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; INODE_SIZE];
        write_u32(&mut bytes, 0, self.valid as u32);
        write_u32(&mut bytes, 4, self.ino);
        write_u32(&mut bytes, 8, self.mode);
        write_u32(&mut bytes, 12, self.size);
        write_u32(&mut bytes, 16, self.num_blocks);
        write_u32(&mut bytes, 20, self.nlink);
        write_u32(&mut bytes, 24, self.atime);
        write_u32(&mut bytes, 28, self.mtime);
        write_u32(&mut bytes, 32, self.ctime);
        for (i, pointer) in self.pointers.iter().enumerate() {
            write_u32(&mut bytes, HEADER_SIZE + i * 4, *pointer);
        }
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let mut pointers = [NULL_POINTER; TOTAL_POINTERS];
        for (i, pointer) in pointers.iter_mut().enumerate() {
            *pointer = read_u32(bytes, HEADER_SIZE + i * 4);
        }
        Inode {
            valid: read_u32(bytes, 0) != 0,
            ino: read_u32(bytes, 4),
            mode: read_u32(bytes, 8),
            size: read_u32(bytes, 12),
            num_blocks: read_u32(bytes, 16),
            nlink: read_u32(bytes, 20),
            atime: read_u32(bytes, 24),
            mtime: read_u32(bytes, 28),
            ctime: read_u32(bytes, 32),
            pointers,
        }
    }
}

impl KnownSize for Inode {
    #[inline]
    fn size_on_disk() -> usize {
        INODE_SIZE
    }
}
