use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use deltastream::source::{ByteSource, MemorySource};
use deltastream::sync::{DeltaPatcher, DeltaResolver, HashListBuilder, SyncError};

/// Deterministic pseudo-random bytes (xorshift64).
fn pseudo_random_bytes(len: usize, mut seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(len + 8);
    while out.len() < len {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        out.extend_from_slice(&seed.to_le_bytes());
    }
    out.truncate(len);
    out
}

#[test]
fn test_large_rearranged_file() {
    let block_size = 1024u64;
    let remote = pseudo_random_bytes(512 * 1024, 0xDEAD_BEEF);

    // Local: the same blocks rotated by 100 block positions, a corrupted
    // stretch, and a truncated tail.
    let rotate_at = 100 * block_size as usize;
    let mut local = Vec::new();
    local.extend_from_slice(&remote[rotate_at..]);
    local.extend_from_slice(&remote[..rotate_at]);
    local[200_000..205_000].fill(0);
    local.truncate(500 * 1024);

    let hashes = HashListBuilder::new()
        .block_size(block_size)
        .build_from_bytes(&remote);
    let source: Arc<dyn ByteSource> = Arc::new(MemorySource::from(local.clone()));
    let resolver = DeltaResolver::new(source, block_size, &hashes, 4).unwrap();
    let delta = resolver.into_result().unwrap();

    let stats = delta.stats(block_size);
    println!("rearranged file: {}", stats);
    assert!(
        stats.relocated > 300,
        "rotation should relocate most blocks, got {}",
        stats.relocated
    );

    let mut fetches = 0;
    let result = DeltaPatcher::new(block_size)
        .apply(&local, &hashes, &delta, remote.len() as u64, |i| {
            fetches += 1;
            let start = i * block_size as usize;
            let end = (start + block_size as usize).min(remote.len());
            Ok(Bytes::copy_from_slice(&remote[start..end]))
        })
        .unwrap();

    assert_eq!(result, remote);
    assert!(
        fetches < delta.block_count() / 4,
        "most blocks should come from local data, fetched {}",
        fetches
    );
}

#[test]
fn test_repeating_pattern_completes_quickly() {
    // A long uniform run exercises the repeating-pattern shortcut: without
    // it, every window start in the run would be strong-hashed.
    let block_size = 8u64;
    let remote: Vec<u8> = b"AAAAAAAA".repeat(512);
    let mut local = remote.clone();
    // Break the run so failed weak lookups actually occur.
    local[2_000] = b'B';

    let hashes = HashListBuilder::new()
        .block_size(block_size)
        .build_from_bytes(&remote);
    let source: Arc<dyn ByteSource> = Arc::new(MemorySource::from(local.clone()));
    let resolver = DeltaResolver::new(source, block_size, &hashes, 2).unwrap();
    let delta = resolver.into_result().unwrap();

    let result = DeltaPatcher::new(block_size)
        .apply(&local, &hashes, &delta, remote.len() as u64, |i| {
            let start = i * block_size as usize;
            let end = (start + block_size as usize).min(remote.len());
            Ok(Bytes::copy_from_slice(&remote[start..end]))
        })
        .unwrap();

    assert_eq!(result, remote);
}

/// Byte source that slows every read down, to observe a scan in flight.
struct SlowSource {
    inner: MemorySource,
    delay: Duration,
}

impl ByteSource for SlowSource {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn read(&self, offset: u64, len: usize) -> io::Result<Bytes> {
        std::thread::sleep(self.delay);
        self.inner.read(offset, len)
    }
}

#[test]
fn test_progress_is_monotonic() {
    let block_size = 512u64;
    let data = pseudo_random_bytes(64 * 1024, 0xABCD_1234);

    let hashes = HashListBuilder::new()
        .block_size(block_size)
        .build_from_bytes(&data);
    let source: Arc<dyn ByteSource> = Arc::new(SlowSource {
        inner: MemorySource::from(data),
        delay: Duration::from_micros(200),
    });
    let resolver = DeltaResolver::new(source, block_size, &hashes, 2).unwrap();

    let mut last = 0;
    for _ in 0..50 {
        let done = resolver.bytes_done();
        assert!(done >= last, "progress went backwards: {} -> {}", last, done);
        assert!(done <= resolver.bytes_total());
        last = done;
        std::thread::sleep(Duration::from_millis(1));
    }

    resolver.wait();
    assert!(resolver.success());
    assert_eq!(resolver.bytes_done(), resolver.bytes_total());
}

#[test]
fn test_cancellation_is_timely() {
    let block_size = 64u64;
    let data = pseudo_random_bytes(128 * 1024, 0xFEED_FACE);

    let hashes = HashListBuilder::new()
        .block_size(block_size)
        .build_from_bytes(&data);
    // ~1ms per read makes the full scan take seconds.
    let source: Arc<dyn ByteSource> = Arc::new(SlowSource {
        inner: MemorySource::from(data),
        delay: Duration::from_millis(1),
    });
    let resolver = DeltaResolver::new(source, block_size, &hashes, 2).unwrap();

    std::thread::sleep(Duration::from_millis(10));
    resolver.cancel();
    resolver.wait();

    assert!(!resolver.success());
    assert!(resolver.bytes_done() < resolver.bytes_total());
    assert!(matches!(resolver.into_result(), Err(SyncError::Cancelled)));
}

#[test]
fn test_many_small_blocks() {
    // Tiny blocks stress the index and the per-position loop.
    let block_size = 4u64;
    let remote = pseudo_random_bytes(16 * 1024, 0x0BAD_F00D);
    let mut local = remote.clone();
    local.rotate_left(1000);

    let hashes = HashListBuilder::new()
        .block_size(block_size)
        .build_from_bytes(&remote);
    let source: Arc<dyn ByteSource> = Arc::new(MemorySource::from(local.clone()));
    let resolver = DeltaResolver::new(source, block_size, &hashes, 4).unwrap();
    let delta = resolver.into_result().unwrap();

    let result = DeltaPatcher::new(block_size)
        .apply(&local, &hashes, &delta, remote.len() as u64, |i| {
            let start = i * block_size as usize;
            let end = (start + block_size as usize).min(remote.len());
            Ok(Bytes::copy_from_slice(&remote[start..end]))
        })
        .unwrap();

    assert_eq!(result, remote);
}
