use std::io;

use crate::consts::{BlockPointer, BLOCK_SIZE};
use crate::driver::DeviceDriver;
use raw::{raw_read_block, raw_write_block};

mod raw;

/// Fixed-size block access on top of a sector device.
pub struct IO<A: DeviceDriver> {
    device: A,
    block_size: usize,
}

impl<A: DeviceDriver> IO<A> {
    pub fn new(device: A) -> io::Result<IO<A>> {
        IO::with_block_size(device, BLOCK_SIZE)
    }

    pub(crate) fn with_block_size(device: A, block_size: usize) -> io::Result<IO<A>> {
        let sector_size = device.get_sector_size();
        if block_size < sector_size || block_size % sector_size != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block size {} is not a multiple of sector size {}", block_size, sector_size),
            ));
        }
        Ok(IO { device, block_size })
    }

    pub fn get_block_size(&self) -> usize {
        self.block_size
    }

    /// True when nothing has ever been written to the device.
    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.device.get_size()? == 0)
    }

    pub fn get_size(&self) -> io::Result<u64> {
        self.device.get_size()
    }

    pub(crate) fn write_block(&mut self, index: BlockPointer, block: &[u8]) -> io::Result<()> {
        if block.len() != self.block_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block size mismatch - expected {}, got {}", self.block_size, block.len()),
            ));
        }
        raw_write_block(&mut self.device, self.block_size, block, index)
    }

    pub(crate) fn read_block(&self, index: BlockPointer) -> io::Result<Vec<u8>> {
        raw_read_block(&self.device, self.block_size, index)
    }

    pub(crate) fn zero_block(&mut self, index: BlockPointer) -> io::Result<()> {
        let zeros = vec![0; self.block_size];
        self.write_block(index, &zeros)
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.device.flush()
    }

    pub fn into_device(self) -> A {
        self.device
    }
}
