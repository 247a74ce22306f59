//! Delta map data model
//!
//! The resolver's output: one [`DeltaElement`] per remote block naming where
//! its bytes can be found locally, plus the identical-block registry. The
//! map travels to the patcher, which executes it against the local file.

use serde::{Deserialize, Serialize};

use crate::sync::index::IdenticalBlocks;

/// Per-block entry of the delta map.
///
/// `local_offset` carries one of two meanings, folded into a single integer:
/// the *canonical* value `block_index * block_size` marks the block as
/// unresolved (fetch from remote, unless the local bytes at that offset
/// happen to already match); any other value is a verified local byte range
/// holding the block's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaElement {
    /// Remote block index this entry describes
    pub block_index: usize,
    /// Where the block's bytes reside in the local file
    pub local_offset: u64,
}

impl DeltaElement {
    /// The canonical local offset of this block: `block_index * block_size`.
    pub fn canonical_offset(&self, block_size: u64) -> u64 {
        self.block_index as u64 * block_size
    }

    /// Whether the entry still carries its canonical value.
    pub fn is_unresolved(&self, block_size: u64) -> bool {
        self.local_offset == self.canonical_offset(block_size)
    }
}

/// The resolver's complete output: per-block source assignments plus the
/// equivalence classes of duplicated remote blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaMap {
    /// One entry per remote block, in block order
    pub map: Vec<DeltaElement>,
    /// Registry of remote blocks sharing a strong hash
    pub identical_blocks: IdenticalBlocks,
}

impl DeltaMap {
    /// A map with every block unresolved (each entry at its canonical
    /// offset). This is the resolver's starting state.
    pub fn unresolved(block_count: usize, block_size: u64) -> Self {
        Self {
            map: (0..block_count)
                .map(|block_index| DeltaElement {
                    block_index,
                    local_offset: block_index as u64 * block_size,
                })
                .collect(),
            identical_blocks: IdenticalBlocks::new(),
        }
    }

    /// Number of remote blocks described by this map.
    pub fn block_count(&self) -> usize {
        self.map.len()
    }

    /// Count resolved vs still-canonical entries.
    pub fn stats(&self, block_size: u64) -> DeltaStats {
        let relocated = self
            .map
            .iter()
            .filter(|element| !element.is_unresolved(block_size))
            .count();

        DeltaStats {
            blocks_total: self.map.len(),
            relocated,
            unresolved: self.map.len() - relocated,
        }
    }

    /// Serialize the map to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("Failed to serialize delta map")
    }

    /// Deserialize from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

/// Statistics about a delta map
#[derive(Debug, Clone)]
pub struct DeltaStats {
    /// Total remote blocks
    pub blocks_total: usize,
    /// Blocks whose bytes were found at a non-canonical local offset
    pub relocated: usize,
    /// Blocks left at their canonical offset (in place, or fetched)
    pub unresolved: usize,
}

impl DeltaStats {
    /// Fraction of blocks the scanner pinned to a shifted local range.
    pub fn relocated_ratio(&self) -> f64 {
        if self.blocks_total == 0 {
            return 0.0;
        }
        self.relocated as f64 / self.blocks_total as f64
    }
}

impl std::fmt::Display for DeltaStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Delta: {} blocks, {} relocated ({:.1}%), {} unresolved",
            self.blocks_total,
            self.relocated,
            self.relocated_ratio() * 100.0,
            self.unresolved
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_unresolved_initialization() {
        let delta = DeltaMap::unresolved(4, 16);

        assert_eq!(delta.block_count(), 4);
        for (i, element) in delta.map.iter().enumerate() {
            assert_eq!(element.block_index, i);
            assert_eq!(element.local_offset, i as u64 * 16);
            assert!(element.is_unresolved(16));
        }
    }

    #[test]
    fn test_stats() {
        let mut delta = DeltaMap::unresolved(4, 16);
        delta.map[1].local_offset = 48; // found at a shifted offset
        delta.map[3].local_offset = 0;

        let stats = delta.stats(16);
        assert_eq!(stats.blocks_total, 4);
        assert_eq!(stats.relocated, 2);
        assert_eq!(stats.unresolved, 2);
        assert!((stats.relocated_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut delta = DeltaMap::unresolved(3, 8);
        delta.map[2].local_offset = 4;
        delta
            .identical_blocks
            .insert(0, BTreeSet::from([1]));
        delta
            .identical_blocks
            .insert(1, BTreeSet::from([0]));

        let restored = DeltaMap::from_bytes(&delta.to_bytes()).unwrap();

        assert_eq!(restored.map, delta.map);
        assert_eq!(restored.identical_blocks, delta.identical_blocks);
    }
}
