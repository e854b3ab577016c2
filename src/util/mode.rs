pub type ModeBits = u32;

const PERMISSIONS_MASK: ModeBits = 0o7777;
const TYPE_MASK: ModeBits = 0o170000;
pub const IS_DIR: ModeBits = 0o040000;
pub const IS_FILE: ModeBits = 0o100000;

pub trait ModeBitsHelper {
    fn get_permissions(&self) -> u16;
    fn is_directory(&self) -> bool;
    fn as_directory(&self) -> ModeBits;
    fn as_file(&self) -> ModeBits;
}

impl ModeBitsHelper for ModeBits {
    fn get_permissions(&self) -> u16 {
        (self & PERMISSIONS_MASK) as u16
    }

    fn is_directory(&self) -> bool {
        (self & TYPE_MASK) == IS_DIR
    }

    /// Keeps the permission bits and forces the directory type.
    fn as_directory(&self) -> ModeBits {
        (self & PERMISSIONS_MASK) | IS_DIR
    }

    /// Keeps the permission bits and forces the regular-file type.
    fn as_file(&self) -> ModeBits {
        (self & PERMISSIONS_MASK) | IS_FILE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_bits() {
        let dir: ModeBits = 0o40755;
        assert!(dir.is_directory());
        assert_eq!(dir.get_permissions(), 0o755);

        let file = (0o644 as ModeBits).as_file();
        assert!(!file.is_directory());
        assert_eq!(file, 0o100644);
        assert_eq!(file.as_directory(), 0o40644);
    }
}
