//! Parallel delta resolver
//!
//! The core of the sync: given the remote hash list and a local byte
//! source, [`DeltaResolver`] scans the local bytes with a rolling window
//! and produces a [`DeltaMap`] naming, for every remote block, a local
//! byte range that already holds its content - or leaving it unresolved
//! for a remote fetch.
//!
//! The local range `[0, L)` is split into coarse chunks, one scan job per
//! chunk, dispatched to a fixed worker pool. Jobs own disjoint window-start
//! ranges, so every window-start position in `[0, L)` is tested exactly
//! once across workers. Matches land in shared map cells as relaxed atomic
//! stores; a progress counter and a cooperative cancel flag round out the
//! task surface.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::metrics::recorder::ResolveMetrics;
use crate::pool::WorkerPool;
use crate::source::ByteSource;
use crate::sync::delta::{DeltaElement, DeltaMap};
use crate::sync::error::{Result, SyncError};
use crate::sync::index::{BlockIndex, IdenticalBlocks};
use crate::sync::rolling_hash::RollingChecksum;
use crate::sync::signature::{strong_hash, RemoteBlockHash, StrongHash};

/// Bytes of local file covered by one scan job.
const SCAN_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// A running (or finished) delta resolution task.
///
/// Construction validates its inputs, builds the hash index, and queues
/// every scan job before returning. [`wait`](Self::wait) blocks until the
/// scan drains; [`into_result`](Self::into_result) waits and then yields
/// the finished [`DeltaMap`], consuming the resolver and with it the last
/// handle on the byte source.
///
/// Dropping an unfinished resolver joins its workers; call
/// [`cancel`](Self::cancel) first to abandon the scan early.
pub struct DeltaResolver {
    state: Arc<ScanState>,
    identical_blocks: IdenticalBlocks,
    pool: WorkerPool,
    metrics: ResolveMetrics,
}

impl DeltaResolver {
    /// Start resolving with an explicit worker count.
    ///
    /// Preconditions: `block_size > 0`, a non-empty hash list, and
    /// `thread_count > 0`. All scan jobs are queued before this returns.
    pub fn new(
        source: Arc<dyn ByteSource>,
        block_size: u64,
        hashes: &[RemoteBlockHash],
        thread_count: usize,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(SyncError::InvalidBlockSize);
        }
        if hashes.is_empty() {
            return Err(SyncError::EmptyHashList);
        }
        if thread_count == 0 {
            return Err(SyncError::NoWorkers);
        }

        let (index, identical_blocks) = BlockIndex::build(hashes);
        let bytes_total = source.size();
        let metrics = ResolveMetrics::start(bytes_total);

        // Every block starts at its canonical offset ("fetch from remote").
        let map = (0..hashes.len())
            .map(|block_index| AtomicU64::new(block_index as u64 * block_size))
            .collect();

        let mut jobs = Vec::new();
        let mut start = 0u64;
        while start < bytes_total {
            let length = SCAN_CHUNK_SIZE.min(bytes_total - start);
            jobs.push((start, length));
            start += length;
        }

        let state = Arc::new(ScanState {
            source,
            index,
            block_size,
            bytes_total,
            map,
            bytes_done: AtomicU64::new(0),
            cancel: AtomicBool::new(false),
            failure: Mutex::new(None),
            pending_jobs: Mutex::new(jobs.len()),
            jobs_done: Condvar::new(),
        });

        let pool = WorkerPool::new(thread_count);
        for (job_start, job_length) in jobs {
            let state = Arc::clone(&state);
            pool.execute(move || state.run_job(job_start, job_length));
        }

        Ok(Self {
            state,
            identical_blocks,
            pool,
            metrics,
        })
    }

    /// Start resolving with one worker per logical CPU.
    pub fn with_default_workers(
        source: Arc<dyn ByteSource>,
        block_size: u64,
        hashes: &[RemoteBlockHash],
    ) -> Result<Self> {
        Self::new(source, block_size, hashes, num_cpus::get().max(1))
    }

    /// Local bytes scanned so far. Monotonically non-decreasing and bounded
    /// by [`bytes_total`](Self::bytes_total).
    pub fn bytes_done(&self) -> u64 {
        self.state.bytes_done.load(Ordering::Relaxed)
    }

    /// Total local bytes to scan.
    pub fn bytes_total(&self) -> u64 {
        self.state.bytes_total
    }

    /// Request cancellation. Returns immediately; workers exit at their next
    /// progress checkpoint. Idempotent.
    pub fn cancel(&self) {
        self.state.cancel.store(true, Ordering::Relaxed);
    }

    /// Block until every scan job has drained (completed, failed, or
    /// observed cancellation).
    pub fn wait(&self) {
        let mut pending = self.state.pending_jobs.lock();
        while *pending > 0 {
            self.state.jobs_done.wait(&mut pending);
        }
    }

    /// Whether the scan ran to completion, uncancelled and without error.
    /// `false` while jobs are still running.
    pub fn success(&self) -> bool {
        *self.state.pending_jobs.lock() == 0
            && !self.state.cancel.load(Ordering::Relaxed)
            && self.state.failure.lock().is_none()
    }

    /// Wait for the scan and return the finished delta map.
    ///
    /// Consumes the resolver, releasing its hold on the byte source so the
    /// caller may re-open it for patching. A cancelled task yields
    /// [`SyncError::Cancelled`]; a source failure yields the first IO error
    /// any worker captured.
    pub fn into_result(self) -> Result<DeltaMap> {
        self.wait();

        let DeltaResolver {
            state,
            identical_blocks,
            pool,
            metrics,
        } = self;
        drop(pool); // joins the (now idle) workers

        if let Some(error) = state.failure.lock().take() {
            metrics.failed(&error.kind().to_string());
            return Err(SyncError::Io(error));
        }
        if state.cancel.load(Ordering::Relaxed) {
            metrics.cancelled();
            return Err(SyncError::Cancelled);
        }

        let block_size = state.block_size;
        let map: Vec<DeltaElement> = state
            .map
            .iter()
            .enumerate()
            .map(|(block_index, cell)| DeltaElement {
                block_index,
                local_offset: cell.load(Ordering::Relaxed),
            })
            .collect();

        let relocated = map
            .iter()
            .filter(|element| !element.is_unresolved(block_size))
            .count();
        metrics.complete(
            state.bytes_done.load(Ordering::Relaxed),
            relocated,
            map.len() - relocated,
        );

        Ok(DeltaMap {
            map,
            identical_blocks,
        })
    }
}

/// State shared between the task handle and its scan workers. Workers
/// mutate only the map cells, the progress counter, the cancel flag and
/// the failure slot; everything else is read-only after construction.
struct ScanState {
    source: Arc<dyn ByteSource>,
    index: BlockIndex,
    block_size: u64,
    bytes_total: u64,
    /// Per-block local offset; canonical value means unresolved.
    map: Vec<AtomicU64>,
    bytes_done: AtomicU64,
    cancel: AtomicBool,
    failure: Mutex<Option<io::Error>>,
    pending_jobs: Mutex<usize>,
    jobs_done: Condvar,
}

impl ScanState {
    fn run_job(&self, start: u64, length: u64) {
        if let Err(error) = self.scan_range(start, length) {
            self.fail(error);
        }

        let mut pending = self.pending_jobs.lock();
        *pending -= 1;
        if *pending == 0 {
            self.jobs_done.notify_all();
        }
    }

    /// Capture the first failure and make every other worker wind down.
    fn fail(&self, error: io::Error) {
        let mut slot = self.failure.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
        drop(slot);
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Scan every window-start position in `[start, start + length)`.
    ///
    /// Windows extend up to `block_size` bytes past the chunk end (they are
    /// bounded by the file, not the chunk), which is how a match beginning
    /// near the boundary is still seen by exactly one job.
    fn scan_range(&self, start: u64, length: u64) -> io::Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Ok(());
        }

        let block_size = self.block_size;
        let total = self.bytes_total;
        let end = start + length;
        // Self-overlap checks read a full block at the canonical offset, so
        // they stop short of the final block position.
        let overlap_check_bound = total.saturating_sub(block_size);

        let mut weak = RollingChecksum::new();
        let mut local_hash_cache: HashMap<u64, StrongHash> = HashMap::new();
        let mut last_failed = false;
        let mut last_failed_weak = 0u32;
        let mut prev_first_byte = 0u8;
        let mut consumed = 0u64;
        let mut pos = start;

        while pos < end {
            // Progress reporting and cancellation checkpoint.
            if consumed >= block_size {
                self.bytes_done.fetch_add(consumed, Ordering::Relaxed);
                consumed = 0;
                if self.cancel.load(Ordering::Relaxed) {
                    return Ok(());
                }
            }

            let window_len = block_size.min(total - pos) as usize;
            let window = self.source.read(pos, window_len)?;
            if weak.is_empty() || (window_len as u64) < block_size {
                // Fresh seed, also used for every short window at the tail:
                // rotating across the final-block boundary is not defined.
                weak.update(&window);
            } else {
                weak.rotate(prev_first_byte, window[window_len - 1]);
            }
            prev_first_byte = window[0];

            let weak_digest = weak.digest();
            if last_failed && weak_digest == last_failed_weak {
                // Repeating-pattern shortcut: a run of bytes producing the
                // same weak digest at every offset without a strong match
                // would otherwise strong-hash each position.
                consumed += 1;
                pos += 1;
                continue;
            }

            let candidates = match self.index.strong_candidates(weak_digest) {
                Some(candidates) => candidates,
                None => {
                    last_failed = true;
                    last_failed_weak = weak_digest;
                    consumed += 1;
                    pos += 1;
                    continue;
                }
            };

            let strong = strong_hash(&window);
            let block_index = match candidates.get(&strong) {
                Some(&block_index) => block_index,
                None => {
                    last_failed = true;
                    last_failed_weak = weak_digest;
                    consumed += 1;
                    pos += 1;
                    continue;
                }
            };
            last_failed = false;

            let canonical = block_index as u64 * block_size;
            if pos != canonical {
                // The matched block may already hold identical data at its
                // canonical offset; pointing it at `pos` would make the
                // patcher move bytes that do not need to move.
                let mut already_in_place = false;
                if canonical < overlap_check_bound {
                    let canonical_hash = match local_hash_cache.get(&canonical) {
                        Some(&hash) => hash,
                        None => {
                            let in_place = self.source.read(canonical, block_size as usize)?;
                            let hash = strong_hash(&in_place);
                            local_hash_cache.insert(canonical, hash);
                            hash
                        }
                    };
                    already_in_place = canonical_hash == strong;
                }

                if !already_in_place {
                    // Another chunk's worker may race this store; any winner
                    // names a window whose bytes hash-match the block.
                    self.map[block_index].store(pos, Ordering::Relaxed);
                }
            }

            // After a match the window restarts one block later.
            weak.clear();
            let step = window_len as u64;
            consumed += step.min(end - pos);
            pos += step;
        }

        self.bytes_done.fetch_add(consumed, Ordering::Relaxed);
        Ok(())
    }
}
