//! Delta map execution
//!
//! [`DeltaPatcher`] turns a [`DeltaMap`] back into remote content: blocks
//! the resolver pinned to a local range are copied, blocks whose canonical
//! offset already holds the right bytes stay put, duplicated blocks are
//! filled from any resolved member of their equivalence class, and only
//! what remains is fetched through the caller's callback.

use std::io;

use bytes::Bytes;
use thiserror::Error;

use crate::metrics::recorder::record_patch_applied;
use crate::sync::delta::DeltaMap;
use crate::sync::signature::{strong_hash, RemoteBlockHash, StrongHash};

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("delta map describes {map_blocks} blocks but hash list has {hash_blocks}")]
    LengthMismatch {
        map_blocks: usize,
        hash_blocks: usize,
    },

    #[error("remote size {remote_size} does not fit {blocks} blocks of {block_size} bytes")]
    SizeMismatch {
        remote_size: u64,
        blocks: usize,
        block_size: u64,
    },

    #[error("copy out of bounds: offset {offset} length {length} in local file of {local_size} bytes")]
    CopyOutOfBounds {
        offset: u64,
        length: usize,
        local_size: usize,
    },

    #[error("fetched block {block_index} has {actual} bytes, expected {expected}")]
    FetchSizeMismatch {
        block_index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("fetched block {block_index} failed strong hash verification")]
    BlockHashMismatch { block_index: usize },

    #[error("patched result failed hash verification")]
    HashMismatch,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, PatchError>;

/// Executes a delta map against the local bytes.
pub struct DeltaPatcher {
    block_size: u64,
}

impl DeltaPatcher {
    /// Create a patcher for the session's block size (must match the one
    /// the hash list and delta map were built with).
    pub fn new(block_size: u64) -> Self {
        Self { block_size }
    }

    /// Reconstruct the remote content.
    ///
    /// `fetch` is called with a remote block index for every block that
    /// cannot be produced from local data; it returns the block's bytes
    /// (short for the final block). Fetched blocks are verified against
    /// the hash list before use.
    pub fn apply<F>(
        &self,
        local: &[u8],
        hashes: &[RemoteBlockHash],
        delta: &DeltaMap,
        remote_size: u64,
        mut fetch: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(usize) -> io::Result<Bytes>,
    {
        if delta.block_count() != hashes.len() {
            return Err(PatchError::LengthMismatch {
                map_blocks: delta.block_count(),
                hash_blocks: hashes.len(),
            });
        }
        if remote_size.div_ceil(self.block_size) as usize != hashes.len() {
            return Err(PatchError::SizeMismatch {
                remote_size,
                blocks: hashes.len(),
                block_size: self.block_size,
            });
        }

        let mut result = Vec::with_capacity(remote_size as usize);
        let mut copied_blocks = 0usize;
        let mut fetched_blocks = 0usize;

        for (block_index, hash) in hashes.iter().enumerate() {
            let canonical = block_index as u64 * self.block_size;
            let length = self.block_size.min(remote_size - canonical) as usize;
            let element = &delta.map[block_index];

            if element.local_offset != canonical {
                // Scanner-assigned range; its content was hash-verified
                // during the scan.
                result.extend_from_slice(copy_range(local, element.local_offset, length)?);
                copied_blocks += 1;
                continue;
            }

            // Canonical entry: either the bytes are already in place, or a
            // duplicate block resolved somewhere usable, or we fetch.
            if let Some(range) = verified_range(local, canonical, length, &hash.strong) {
                result.extend_from_slice(range);
                copied_blocks += 1;
                continue;
            }

            if let Some(range) = self.class_source(local, delta, block_index, length, &hash.strong)
            {
                result.extend_from_slice(range);
                copied_blocks += 1;
                continue;
            }

            let data = fetch(block_index)?;
            if data.len() != length {
                return Err(PatchError::FetchSizeMismatch {
                    block_index,
                    expected: length,
                    actual: data.len(),
                });
            }
            if strong_hash(&data) != hash.strong {
                return Err(PatchError::BlockHashMismatch { block_index });
            }
            result.extend_from_slice(&data);
            fetched_blocks += 1;
        }

        record_patch_applied(copied_blocks, fetched_blocks);
        Ok(result)
    }

    /// [`apply`](Self::apply), then verify the whole result against the
    /// remote file's BLAKE3 hash.
    pub fn apply_verified<F>(
        &self,
        local: &[u8],
        hashes: &[RemoteBlockHash],
        delta: &DeltaMap,
        remote_size: u64,
        expected_hash: &[u8; 32],
        fetch: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(usize) -> io::Result<Bytes>,
    {
        let result = self.apply(local, hashes, delta, remote_size, fetch)?;

        if blake3::hash(&result).as_bytes() != expected_hash {
            return Err(PatchError::HashMismatch);
        }

        Ok(result)
    }

    /// Look for the block's content through its equivalence class: any
    /// member's local range (scanner-assigned or in place) with matching
    /// bytes will do. Inferred ranges are re-verified - unlike the block's
    /// own map entry, the scanner never vouched for them for *this* block.
    fn class_source<'a>(
        &self,
        local: &'a [u8],
        delta: &DeltaMap,
        block_index: usize,
        length: usize,
        strong: &StrongHash,
    ) -> Option<&'a [u8]> {
        let class = delta.identical_blocks.get(&block_index)?;

        for &other in class {
            let offset = delta.map[other].local_offset;
            if let Some(range) = verified_range(local, offset, length, strong) {
                return Some(range);
            }
        }

        None
    }
}

fn copy_range(local: &[u8], offset: u64, length: usize) -> Result<&[u8]> {
    let start = offset as usize;
    let end = start
        .checked_add(length)
        .filter(|&end| end <= local.len())
        .ok_or(PatchError::CopyOutOfBounds {
            offset,
            length,
            local_size: local.len(),
        })?;

    Ok(&local[start..end])
}

/// The local range at `offset`, but only if its bytes strong-match.
fn verified_range<'a>(
    local: &'a [u8],
    offset: u64,
    length: usize,
    strong: &StrongHash,
) -> Option<&'a [u8]> {
    let start = offset as usize;
    let end = start.checked_add(length)?;
    if end > local.len() {
        return None;
    }

    let range = &local[start..end];
    (strong_hash(range) == *strong).then_some(range)
}
