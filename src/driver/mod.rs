use std::io;

pub mod file_drive;
pub mod memory_drive;

pub use file_drive::FileDrive;
pub use memory_drive::MemoryDrive;

/// Raw sector storage underneath the block layer.
///
/// Reads past the current end of the device return zeros and writes past it
/// grow the device, so a freshly created image can start out empty.
pub trait DeviceDriver {
    fn get_sector_size(&self) -> usize;
    /// Current size in bytes.
    fn get_size(&self) -> io::Result<u64>;
    fn read_sector(&self, index: u64) -> io::Result<Vec<u8>>;
    fn write_sector(&mut self, index: u64, data: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;

    fn get_sector_count(&self) -> io::Result<u64> {
        Ok(self.get_size()? / self.get_sector_size() as u64)
    }
}
