use std::io;

use bytes::Bytes;

use super::ByteSource;

/// In-memory byte source. Reads are zero-copy slices of the backing
/// [`Bytes`] buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for MemorySource {
    fn from(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }
}

impl ByteSource for MemorySource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&self, offset: u64, len: usize) -> io::Result<Bytes> {
        let end = offset
            .checked_add(len as u64)
            .filter(|&end| end <= self.data.len() as u64)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "read of {} bytes at offset {} beyond source of {} bytes",
                        len,
                        offset,
                        self.data.len()
                    ),
                )
            })?;

        Ok(self.data.slice(offset as usize..end as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_bounds() {
        let source = MemorySource::from(b"0123456789".as_slice());

        assert_eq!(source.size(), 10);
        assert_eq!(&source.read(0, 4).unwrap()[..], b"0123");
        assert_eq!(&source.read(6, 4).unwrap()[..], b"6789");
        assert_eq!(&source.read(10, 0).unwrap()[..], b"");
    }

    #[test]
    fn test_read_past_end_fails() {
        let source = MemorySource::from(b"0123".as_slice());

        assert!(source.read(2, 3).is_err());
        assert!(source.read(5, 1).is_err());
    }
}
