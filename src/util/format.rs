use std::fmt;

const KILO_BYTE: u64 = 1024;
const MEGA_BYTE: u64 = KILO_BYTE * 1024;
const GIGA_BYTE: u64 = MEGA_BYTE * 1024;

/// Human readable byte count for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSize(pub u64);

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes < KILO_BYTE {
            write!(f, "{} B", bytes)
        } else if bytes < MEGA_BYTE {
            write!(f, "{:.2} KiB", bytes as f64 / KILO_BYTE as f64)
        } else if bytes < GIGA_BYTE {
            write!(f, "{:.2} MiB", bytes as f64 / MEGA_BYTE as f64)
        } else {
            write!(f, "{:.2} GiB", bytes as f64 / GIGA_BYTE as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ByteSize;

    #[test]
    fn pretty_sizes() {
        assert_eq!(ByteSize(600).to_string(), "600 B");
        assert_eq!(ByteSize(1536).to_string(), "1.50 KiB");
        assert_eq!(ByteSize(16 * 1024 * 1024).to_string(), "16.00 MiB");
    }
}
