use std::io;

use crate::driver::DeviceDriver;

/// A growable in-memory drive.
#[derive(Debug, Clone)]
pub struct MemoryDrive {
    data: Vec<u8>,
    sector_size: usize,
}

impl MemoryDrive {
    pub fn new(sector_size: usize) -> MemoryDrive {
        MemoryDrive { data: Vec::new(), sector_size }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl DeviceDriver for MemoryDrive {
    fn get_sector_size(&self) -> usize {
        self.sector_size
    }

    fn get_size(&self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_sector(&self, index: u64) -> io::Result<Vec<u8>> {
        let start = index as usize * self.sector_size;
        let mut buffer = vec![0; self.sector_size];
        if start < self.data.len() {
            let end = (start + self.sector_size).min(self.data.len());
            buffer[..end - start].copy_from_slice(&self.data[start..end]);
        }
        Ok(buffer)
    }

    fn write_sector(&mut self, index: u64, data: &[u8]) -> io::Result<()> {
        if data.len() != self.sector_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("sector size mismatch - expected {}, got {}", self.sector_size, data.len()),
            ));
        }
        let start = index as usize * self.sector_size;
        let end = start + self.sector_size;
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_on_write() {
        let mut drive = MemoryDrive::new(512);
        assert_eq!(drive.get_size().unwrap(), 0);
        drive.write_sector(2, &vec![0x8; 512]).unwrap();
        assert_eq!(drive.get_sector_count().unwrap(), 3);
        assert_eq!(drive.read_sector(1).unwrap(), vec![0; 512]);
        assert_eq!(drive.read_sector(2).unwrap(), vec![0x8; 512]);
        assert_eq!(drive.read_sector(9).unwrap(), vec![0; 512]);
    }
}
