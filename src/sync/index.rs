//! Two-level block hash index
//!
//! Maps `weak digest -> strong digest -> remote block index` for the scan's
//! hot path, and tracks the equivalence classes of remote blocks that share
//! a strong hash (duplicated content). Both are built once from the remote
//! hash list and read-only afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::sync::signature::{RemoteBlockHash, StrongHash};

/// Equivalence classes of duplicated remote blocks: for each block index
/// whose strong hash appears more than once in the remote list, the set of
/// *other* indices with the same strong hash. Symmetric by construction.
pub type IdenticalBlocks = BTreeMap<usize, BTreeSet<usize>>;

/// Two-level lookup from weak digest to strong digest to block index.
pub struct BlockIndex {
    table: HashMap<u32, HashMap<StrongHash, usize>>,
}

impl BlockIndex {
    /// Build the index and the identical-block registry from a remote hash
    /// list.
    ///
    /// When several remote blocks share both digests, the index keeps one
    /// representative (the last insertion wins; arbitrary but deterministic)
    /// and the registry preserves the full equivalence class.
    pub fn build(hashes: &[RemoteBlockHash]) -> (Self, IdenticalBlocks) {
        let mut table: HashMap<u32, HashMap<StrongHash, usize>> =
            HashMap::with_capacity(hashes.len());
        let mut classes: HashMap<StrongHash, BTreeSet<usize>> = HashMap::new();

        for (block_index, hash) in hashes.iter().enumerate() {
            table
                .entry(hash.weak)
                .or_default()
                .insert(hash.strong, block_index);
            classes.entry(hash.strong).or_default().insert(block_index);
        }

        // Drop singleton classes; a block without duplicates has no entry.
        let mut identical_blocks = IdenticalBlocks::new();
        for class in classes.into_values() {
            if class.len() > 1 {
                for &block_index in &class {
                    let mut others = class.clone();
                    others.remove(&block_index);
                    identical_blocks.insert(block_index, others);
                }
            }
        }

        (Self { table }, identical_blocks)
    }

    /// All strong-hash candidates for a weak digest, if any.
    pub fn strong_candidates(&self, weak: u32) -> Option<&HashMap<StrongHash, usize>> {
        self.table.get(&weak)
    }

    /// Full two-level lookup.
    pub fn find(&self, weak: u32, strong: &StrongHash) -> Option<usize> {
        self.table.get(&weak).and_then(|inner| inner.get(strong)).copied()
    }
}
