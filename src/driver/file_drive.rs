use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use tracing::debug;

use crate::driver::DeviceDriver;

/// A drive backed by a single image file.
pub struct FileDrive {
    file: File,
    sector_size: usize,
}

impl FileDrive {
    /// Opens the image, creating an empty one if it does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P, sector_size: usize) -> io::Result<FileDrive> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let bytes = file.metadata()?.len();
        if bytes % sector_size as u64 != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("image size {} is not a multiple of {}", bytes, sector_size),
            ));
        }
        debug!(path = %path.display(), bytes, "opened image file");
        Ok(FileDrive { file, sector_size })
    }
}

impl DeviceDriver for FileDrive {
    fn get_sector_size(&self) -> usize {
        self.sector_size
    }

    fn get_size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_sector(&self, index: u64) -> io::Result<Vec<u8>> {
        let mut buffer = vec![0; self.sector_size];
        let start = index * self.sector_size as u64;
        let mut filled = 0;
        while filled < buffer.len() {
            match self.file.read_at(&mut buffer[filled..], start + filled as u64) {
                // past the end of the file: the rest stays zeroed
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
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
        self.file.write_all_at(data, index * self.sector_size as u64)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_image_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let drive = FileDrive::open(dir.path().join("empty.img"), 512).unwrap();
        assert_eq!(drive.get_size().unwrap(), 0);
        assert_eq!(drive.read_sector(7).unwrap(), vec![0; 512]);
    }

    #[test]
    fn read_write_sectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.img");
        {
            let mut drive = FileDrive::open(&path, 512).unwrap();

            let sector0 = vec![0x42; 512];
            let sector1023 = vec![0x52; 512];
            drive.write_sector(0, &sector0).unwrap();
            drive.write_sector(1023, &sector1023).unwrap();

            assert_eq!(drive.read_sector(0).unwrap(), sector0);
            assert_eq!(drive.read_sector(1023).unwrap(), sector1023);
            assert_eq!(drive.read_sector(511).unwrap(), vec![0; 512]);
            assert_eq!(drive.get_size().unwrap(), 1024 * 512);
            drive.flush().unwrap();
        }

        let drive = FileDrive::open(&path, 512).unwrap();
        assert_eq!(drive.read_sector(1023).unwrap(), vec![0x52; 512]);
    }

    #[test]
    fn rejects_short_sector() {
        let dir = tempfile::tempdir().unwrap();
        let mut drive = FileDrive::open(dir.path().join("short.img"), 512).unwrap();
        assert!(drive.write_sector(0, &[1, 2, 3]).is_err());
    }

    #[test]
    fn rejects_misaligned_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.img");
        std::fs::write(&path, vec![0u8; 700]).unwrap();
        assert!(FileDrive::open(&path, 512).is_err());
    }
}
