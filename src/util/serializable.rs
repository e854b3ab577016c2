/// Fixed-offset binary codec for on-disk records.
pub trait ByteSerializable {
    fn to_bytes(&self) -> Vec<u8>;
    fn from_bytes(bytes: &[u8]) -> Self;
}

pub trait KnownSize: ByteSerializable {
    fn size_on_disk() -> usize;
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

pub(crate) fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Decodes a whole index block into its block numbers.
pub(crate) fn read_u32_array(bytes: &[u8]) -> Vec<u32> {
    bytes.chunks_exact(4).map(|chunk| read_u32(chunk, 0)).collect()
}

pub(crate) fn write_u32_array(values: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_words() {
        let mut bytes = vec![0u8; 8];
        write_u32(&mut bytes, 4, 0x0102_0304);
        assert_eq!(bytes, vec![0, 0, 0, 0, 4, 3, 2, 1]);
        assert_eq!(read_u32(&bytes, 4), 0x0102_0304);
        assert_eq!(read_u32_array(&bytes), vec![0, 0x0102_0304]);
        assert_eq!(write_u32_array(&[0, 0x0102_0304]), bytes);
    }
}
