//! Random-access byte sources
//!
//! The resolver scans the local file through a small capability interface:
//! positioned reads and a size. Implementations cover an in-memory buffer
//! ([`MemorySource`]) and a file on disk ([`FileSource`]); anything
//! random-access and thread-safe for concurrent reads can participate.

pub mod file;
pub mod memory;

use bytes::Bytes;

pub use file::FileSource;
pub use memory::MemorySource;

/// Random-access view of the local byte sequence.
///
/// Reads are concurrent: scan workers call `read` from multiple threads at
/// once. The resolver never writes through this interface.
pub trait ByteSource: Send + Sync {
    /// Total length of the byte sequence.
    fn size(&self) -> u64;

    /// Read `len` bytes starting at `offset` into an owned buffer.
    ///
    /// The requested range must lie within `[0, size())`; reading past the
    /// end is an error (`UnexpectedEof`), not a short read.
    fn read(&self, offset: u64, len: usize) -> std::io::Result<Bytes>;
}
