//! Delta synchronization module
//!
//! Provides rsync-style delta resolution using rolling checksums and strong
//! hashes: a parallel resolver maps every remote block to either a local
//! byte range or "fetch from remote", and a patcher executes that map to
//! reconstruct the remote content block by block.

pub mod delta;
pub mod error;
pub mod index;
pub mod patch;
pub mod resolver;
pub mod rolling_hash;
pub mod signature;

pub use delta::{DeltaElement, DeltaMap, DeltaStats};
pub use error::{Result, SyncError};
pub use index::{BlockIndex, IdenticalBlocks};
pub use patch::{DeltaPatcher, PatchError};
pub use resolver::DeltaResolver;
pub use rolling_hash::RollingChecksum;
pub use signature::{
    strong_hash, HashListBuilder, RemoteBlockHash, RemoteFileHashList, StrongHash,
};
