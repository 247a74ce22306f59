//! Remote hash list generation
//!
//! The remote side of a sync splits its file into fixed-size blocks and
//! publishes one [`RemoteBlockHash`] per block: a weak rolling checksum for
//! cheap candidate lookup and a strong BLAKE3 digest for confirmation. The
//! resolver consumes the ordered list; block `i` covers remote bytes
//! `[i*block_size, (i+1)*block_size)`, with the last block possibly short.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::sync::rolling_hash::RollingChecksum;

/// Default block size for hash lists (4KB)
pub const DEFAULT_BLOCK_SIZE: u64 = 4096;

/// Width of the strong hash in bytes (BLAKE3, truncated to 128 bits).
pub const STRONG_HASH_LEN: usize = 16;

/// Strong block digest. Opaque bytes; equality and hashing only.
pub type StrongHash = [u8; STRONG_HASH_LEN];

/// Compute the strong hash of a block.
pub fn strong_hash(data: &[u8]) -> StrongHash {
    let digest = blake3::hash(data);
    let mut strong = [0u8; STRONG_HASH_LEN];
    strong.copy_from_slice(&digest.as_bytes()[..STRONG_HASH_LEN]);
    strong
}

/// Weak and strong digests of a single remote block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBlockHash {
    /// Weak rolling checksum (Adler-32 style)
    pub weak: u32,
    /// Strong hash (BLAKE3, truncated to 128 bits)
    pub strong: StrongHash,
}

impl RemoteBlockHash {
    /// Hash one block of remote data.
    pub fn of_block(data: &[u8]) -> Self {
        Self {
            weak: RollingChecksum::checksum(data),
            strong: strong_hash(data),
        }
    }

    /// Verify that `data` matches this block's digests.
    pub fn matches(&self, data: &[u8]) -> bool {
        // Weak check first (fast), then the strong hash settles it.
        RollingChecksum::checksum(data) == self.weak && strong_hash(data) == self.strong
    }
}

/// Ordered block hash list of the remote file. Block index `i` is its
/// position in the list; its canonical remote offset is `i * block_size`.
pub type RemoteFileHashList = Vec<RemoteBlockHash>;

/// Serialize a hash list for transport (bincode).
pub fn encode_hash_list(hashes: &RemoteFileHashList) -> Vec<u8> {
    bincode::serialize(hashes).expect("Failed to serialize hash list")
}

/// Deserialize a hash list received from the remote side.
pub fn decode_hash_list(data: &[u8]) -> Result<RemoteFileHashList, bincode::Error> {
    bincode::deserialize(data)
}

/// Builder for remote file hash lists
pub struct HashListBuilder {
    block_size: u64,
}

impl HashListBuilder {
    /// Create a new builder with the default block size
    pub fn new() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Set the block size
    pub fn block_size(mut self, size: u64) -> Self {
        self.block_size = size;
        self
    }

    /// Build a hash list from a byte slice
    pub fn build_from_bytes(&self, data: &[u8]) -> RemoteFileHashList {
        data.chunks(self.block_size as usize)
            .map(RemoteBlockHash::of_block)
            .collect()
    }

    /// Build a hash list from a reader (for large files)
    pub fn build_from_reader<R: Read>(&self, reader: &mut R) -> std::io::Result<RemoteFileHashList> {
        let mut hashes = Vec::new();
        let mut buffer = vec![0u8; self.block_size as usize];

        loop {
            let filled = fill_block(reader, &mut buffer)?;
            if filled == 0 {
                break;
            }
            hashes.push(RemoteBlockHash::of_block(&buffer[..filled]));
            if filled < buffer.len() {
                break;
            }
        }

        Ok(hashes)
    }
}

impl Default for HashListBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Read until `buf` is full or EOF; a short `read` does not end a block.
fn fill_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_block_hash_matches() {
        let data = b"Hello, World! This is a test block.";
        let hash = RemoteBlockHash::of_block(data);

        assert!(hash.matches(data));
        assert!(!hash.matches(b"Different data"));
        assert!(!hash.matches(b"Hello, World! This is a test block")); // One char less
    }

    #[test]
    fn test_builder_from_bytes() {
        let data = b"The quick brown fox jumps over the lazy dog. ".repeat(100);
        let builder = HashListBuilder::new().block_size(64);

        let hashes = builder.build_from_bytes(&data);

        assert_eq!(hashes.len(), data.len().div_ceil(64));

        // Verify each block hash against its source bytes
        for (i, hash) in hashes.iter().enumerate() {
            let start = i * 64;
            let end = (start + 64).min(data.len());
            assert!(hash.matches(&data[start..end]));
        }
    }

    #[test]
    fn test_builder_short_last_block() {
        let data = b"0123456789"; // 10 bytes, block size 4 -> 4 + 4 + 2
        let hashes = HashListBuilder::new().block_size(4).build_from_bytes(data);

        assert_eq!(hashes.len(), 3);
        assert!(hashes[2].matches(b"89"));
    }

    #[test]
    fn test_builder_from_reader_matches_bytes() {
        let data = b"Test data for reader-based hash list building.".repeat(50);
        let builder = HashListBuilder::new().block_size(128);

        let from_bytes = builder.build_from_bytes(&data);
        let from_reader = builder
            .build_from_reader(&mut Cursor::new(&data))
            .unwrap();

        assert_eq!(from_bytes, from_reader);
    }

    #[test]
    fn test_builder_empty_input() {
        let hashes = HashListBuilder::new().block_size(4).build_from_bytes(b"");
        assert!(hashes.is_empty());

        let from_reader = HashListBuilder::new()
            .block_size(4)
            .build_from_reader(&mut Cursor::new(b""))
            .unwrap();
        assert!(from_reader.is_empty());
    }

    #[test]
    fn test_hash_list_serialization() {
        let data = b"Some content worth hashing, block by block.";
        let hashes = HashListBuilder::new().block_size(8).build_from_bytes(data);

        let bytes = encode_hash_list(&hashes);
        let restored = decode_hash_list(&bytes).unwrap();

        assert_eq!(restored, hashes);
    }
}
