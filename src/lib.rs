//! DeltaStream - block-level delta synchronization
//!
//! Synchronizes a local byte sequence to match a remote one by transferring
//! only the regions that differ, rsync-style:
//!
//! 1. The remote side publishes a hash list: one weak (rolling) and one
//!    strong (BLAKE3) digest per fixed-size block.
//! 2. The local side runs a [`sync::DeltaResolver`], which scans the local
//!    bytes with a rolling window across a pool of worker threads and maps
//!    every remote block to either a local byte range or "fetch from remote".
//! 3. A [`sync::DeltaPatcher`] executes that map, copying local data where it
//!    exists and fetching the rest through a caller-supplied callback.
//!
//! The scanner works against any [`source::ByteSource`] - an in-memory
//! buffer or a file - and reports progress, supports cooperative
//! cancellation, and surfaces the equivalence classes of duplicated remote
//! blocks so the patcher can reuse one resolved copy for all of them.

pub mod metrics;
pub mod pool;
pub mod source;
pub mod sync;

pub use source::{ByteSource, FileSource, MemorySource};
pub use sync::{
    DeltaElement, DeltaMap, DeltaPatcher, DeltaResolver, HashListBuilder, RemoteBlockHash,
    RemoteFileHashList, RollingChecksum, StrongHash,
};
