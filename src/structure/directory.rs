use tracing::debug;

use crate::consts::{InodePointer, DIRENTRY_SIZE, MAX_NAME_LENGTH, NAME_LENGTH};
use crate::driver::DeviceDriver;
use crate::structure::inode::Inode;
use crate::structure::Structure;
use crate::util::error::{Error, Result};
use crate::util::serializable::{read_u32, write_u32, ByteSerializable, KnownSize};

/// One name to inode record. On disk the record sits at the start of a
/// fixed slot; the rest of the slot is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: InodePointer,
    pub name: String,
}

impl ByteSerializable for DirEntry {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; DIRENTRY_SIZE];
        write_u32(&mut bytes, 0, self.ino);
        let name = self.name.as_bytes();
        let length = name.len().min(MAX_NAME_LENGTH);
        bytes[4..4 + length].copy_from_slice(&name[..length]);
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let raw = &bytes[4..4 + NAME_LENGTH];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LENGTH);
        DirEntry { ino: read_u32(bytes, 0), name: String::from_utf8_lossy(&raw[..end]).into_owned() }
    }
}

impl KnownSize for DirEntry {
    #[inline]
    fn size_on_disk() -> usize {
        DIRENTRY_SIZE
    }
}

/// Rejects names that cannot be stored as a single entry.
pub fn check_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::NameTooLong(name.len()));
    }
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

impl<A: DeviceDriver> Structure<A> {
    /// Live entries of `dir`, in slot order.
    pub fn dir_entries(&self, dir: &Inode) -> Result<Vec<DirEntry>> {
        if !dir.is_directory() {
            return Err(Error::NotADirectory);
        }
        let data = self.read(dir, 0, dir.size as usize)?;
        Ok(data.chunks_exact(DIRENTRY_SIZE).map(DirEntry::from_bytes).collect())
    }

    pub fn dir_lookup(&self, dir: &Inode, name: &str) -> Result<InodePointer> {
        check_name(name)?;
        self.dir_entries(dir)?
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.ino)
            .ok_or(Error::NotFound)
    }

    /// Adds `name -> ino` in the slot just past the last live entry.
    pub fn dir_append(&mut self, dir: &mut Inode, name: &str, ino: InodePointer) -> Result<()> {
        match self.dir_lookup(dir, name) {
            Ok(_) => return Err(Error::AlreadyExists),
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }
        let entry = DirEntry { ino, name: name.to_string() };
        let offset = dir.size as u64;
        self.write(dir, offset, &entry.to_bytes())?;
        debug!(dir = dir.ino, name, ino, slot = offset / DIRENTRY_SIZE as u64, "appended entry");
        Ok(())
    }

    /// Drops the entry pointing at `ino`. The last entry moves into the hole
    /// and the directory shrinks by one slot, giving back a block that empties.
    pub fn dir_remove(&mut self, dir: &mut Inode, ino: InodePointer) -> Result<()> {
        let entries = self.dir_entries(dir)?;
        let position = entries.iter().position(|entry| entry.ino == ino).ok_or(Error::NotFound)?;
        let last = entries.len() - 1;
        if position != last {
            let moved = entries[last].to_bytes();
            self.write(dir, (position * DIRENTRY_SIZE) as u64, &moved)?;
        }
        self.truncate(dir, (last * DIRENTRY_SIZE) as u64)?;
        debug!(dir = dir.ino, ino, slot = position, "removed entry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::consts::{BLOCK_SIZE, DIRENTRIES_PER_BLOCK};
    use crate::structure::tests::formatted;
    use crate::util::mode::IS_FILE;

    #[test]
    fn entry_layout() {
        let bytes = DirEntry { ino: 7, name: "a.txt".to_string() }.to_bytes();
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[..4], &[7, 0, 0, 0]);
        assert_eq!(&bytes[4..9], b"a.txt");
        assert!(bytes[9..].iter().all(|&b| b == 0));
        assert_eq!(DirEntry::from_bytes(&bytes).name, "a.txt");
        assert_eq!(BLOCK_SIZE / DirEntry::size_on_disk(), DIRENTRIES_PER_BLOCK);
    }

    #[test]
    fn full_length_name() {
        let name = "n".repeat(31);
        let entry = DirEntry { ino: 1, name: name.clone() };
        assert_eq!(DirEntry::from_bytes(&entry.to_bytes()).name, name);
    }

    #[test]
    fn names_are_checked() {
        assert!(check_name("ok").is_ok());
        assert!(matches!(check_name(&"x".repeat(32)), Err(Error::NameTooLong(32))));
        for bad in ["", ".", "..", "a/b", "nul\0"] {
            assert!(matches!(check_name(bad), Err(Error::InvalidName(_))), "{:?}", bad);
        }
    }

    #[test]
    fn append_and_lookup() {
        let mut structure = formatted();
        let mut root = structure.get_inode(structure.root_ino()).unwrap();
        structure.dir_append(&mut root, "a", 5).unwrap();
        structure.dir_append(&mut root, "b", 6).unwrap();

        assert_eq!(root.size, 128);
        assert_eq!(structure.dir_lookup(&root, "b").unwrap(), 6);
        assert!(matches!(structure.dir_lookup(&root, "c"), Err(Error::NotFound)));
        assert!(matches!(structure.dir_append(&mut root, "a", 9), Err(Error::AlreadyExists)));
        assert_eq!(structure.get_inode(root.ino).unwrap().size, 128);
    }

    #[test]
    fn files_are_not_directories() {
        let mut structure = formatted();
        let mut file = structure.allocate_inode(IS_FILE | 0o644).unwrap();
        assert!(matches!(structure.dir_entries(&file), Err(Error::NotADirectory)));
        assert!(matches!(structure.dir_append(&mut file, "x", 1), Err(Error::NotADirectory)));
        assert!(matches!(structure.dir_remove(&mut file, 1), Err(Error::NotADirectory)));
    }

    #[test]
    fn remove_moves_last_entry() {
        let mut structure = formatted();
        let mut root = structure.get_inode(structure.root_ino()).unwrap();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            structure.dir_append(&mut root, name, i as u32 + 1).unwrap();
        }
        structure.dir_remove(&mut root, 1).unwrap();

        let entries = structure.dir_entries(&root).unwrap();
        assert_eq!(
            entries,
            vec![DirEntry { ino: 3, name: "c".to_string() }, DirEntry { ino: 2, name: "b".to_string() }]
        );
        assert!(matches!(structure.dir_remove(&mut root, 1), Err(Error::NotFound)));
    }

    #[test]
    fn emptied_block_is_released() {
        let mut structure = formatted();
        let mut root = structure.get_inode(structure.root_ino()).unwrap();
        let before = structure.data_map().used_count();
        for i in 0..9u32 {
            structure.dir_append(&mut root, &format!("f{}", i), i + 1).unwrap();
        }
        assert_eq!(root.num_blocks, 2);
        assert_eq!(structure.data_map().used_count(), before + 2);

        structure.dir_remove(&mut root, 3).unwrap();
        assert_eq!(root.num_blocks, 1);
        assert_eq!(root.size as usize, 8 * DIRENTRY_SIZE);
        assert_eq!(structure.data_map().used_count(), before + 1);
        assert_eq!(structure.dir_lookup(&root, "f8").unwrap(), 9);
    }

    #[test]
    fn create_many_remove_some() {
        let mut structure = formatted();
        let mut root = structure.get_inode(structure.root_ino()).unwrap();
        let mut expected = HashMap::new();
        for i in 0..40u32 {
            let name = format!("entry-{}", i);
            structure.dir_append(&mut root, &name, 100 + i).unwrap();
            expected.insert(name, 100 + i);
        }
        for i in (0..40u32).filter(|i| i % 3 == 0) {
            structure.dir_remove(&mut root, 100 + i).unwrap();
            expected.remove(&format!("entry-{}", i));
        }

        let entries = structure.dir_entries(&root).unwrap();
        assert_eq!(entries.len(), 40 - 14);
        assert_eq!(entries.len(), expected.len());
        for entry in &entries {
            assert_eq!(expected.get(&entry.name), Some(&entry.ino));
            assert_eq!(structure.dir_lookup(&root, &entry.name).unwrap(), entry.ino);
        }
    }
}
