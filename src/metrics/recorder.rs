//! Metrics recorder for delta resolution and patching
//!
//! Records counters, gauges and histograms describing scan progress and
//! patch execution.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    // Resolve lifecycle counters
    describe_counter!(
        "deltastream_resolves_started_total",
        "Total number of delta resolutions started"
    );
    describe_counter!(
        "deltastream_resolves_completed_total",
        "Total number of delta resolutions completed successfully"
    );
    describe_counter!(
        "deltastream_resolves_cancelled_total",
        "Total number of delta resolutions cancelled"
    );
    describe_counter!(
        "deltastream_resolves_failed_total",
        "Total number of delta resolutions that failed on source IO"
    );

    // Scan counters
    describe_counter!(
        "deltastream_scanned_bytes_total",
        "Total local bytes scanned by resolve tasks"
    );
    describe_counter!(
        "deltastream_blocks_relocated_total",
        "Remote blocks matched at a shifted local offset"
    );
    describe_counter!(
        "deltastream_blocks_unresolved_total",
        "Remote blocks left at their canonical offset"
    );

    // Patch counters
    describe_counter!(
        "deltastream_patch_copied_blocks_total",
        "Blocks reconstructed from local data during patching"
    );
    describe_counter!(
        "deltastream_patch_fetched_blocks_total",
        "Blocks fetched from the remote side during patching"
    );

    // Gauges
    describe_gauge!(
        "deltastream_active_resolves",
        "Number of currently running resolve tasks"
    );

    // Histograms
    describe_histogram!(
        "deltastream_resolve_size_bytes",
        "Local file size at resolve start"
    );
    describe_histogram!(
        "deltastream_resolve_duration_seconds",
        "Wall-clock duration of a resolve task"
    );
    describe_histogram!(
        "deltastream_scan_throughput_bytes_per_second",
        "Scan throughput of a completed resolve task"
    );
}

// ============== Resolve Operations ==============

/// Record a resolve task starting
pub fn record_resolve_started(bytes_total: u64) {
    counter!("deltastream_resolves_started_total").increment(1);
    gauge!("deltastream_active_resolves").increment(1.0);

    histogram!("deltastream_resolve_size_bytes").record(bytes_total as f64);
}

/// Record a resolve task completing successfully
pub fn record_resolve_completed(
    duration: Duration,
    bytes_scanned: u64,
    relocated: usize,
    unresolved: usize,
) {
    counter!("deltastream_resolves_completed_total").increment(1);
    gauge!("deltastream_active_resolves").decrement(1.0);

    counter!("deltastream_scanned_bytes_total").increment(bytes_scanned);
    counter!("deltastream_blocks_relocated_total").increment(relocated as u64);
    counter!("deltastream_blocks_unresolved_total").increment(unresolved as u64);

    histogram!("deltastream_resolve_duration_seconds").record(duration.as_secs_f64());

    let throughput = if duration.as_secs_f64() > 0.0 {
        bytes_scanned as f64 / duration.as_secs_f64()
    } else {
        0.0
    };
    histogram!("deltastream_scan_throughput_bytes_per_second").record(throughput);
}

/// Record a resolve task being cancelled
pub fn record_resolve_cancelled() {
    counter!("deltastream_resolves_cancelled_total").increment(1);
    gauge!("deltastream_active_resolves").decrement(1.0);
}

/// Record a resolve task failing on source IO
pub fn record_resolve_failed(reason: &str) {
    counter!("deltastream_resolves_failed_total", "reason" => reason.to_string()).increment(1);
    gauge!("deltastream_active_resolves").decrement(1.0);
}

// ============== Patch Operations ==============

/// Record a patch pass over a delta map
pub fn record_patch_applied(copied_blocks: usize, fetched_blocks: usize) {
    counter!("deltastream_patch_copied_blocks_total").increment(copied_blocks as u64);
    counter!("deltastream_patch_fetched_blocks_total").increment(fetched_blocks as u64);
}

/// Helper struct to time a resolve task and record its outcome
pub struct ResolveMetrics {
    start_time: Instant,
}

impl ResolveMetrics {
    /// Start tracking a new resolve task
    pub fn start(bytes_total: u64) -> Self {
        record_resolve_started(bytes_total);
        Self {
            start_time: Instant::now(),
        }
    }

    /// Record successful completion
    pub fn complete(self, bytes_scanned: u64, relocated: usize, unresolved: usize) {
        record_resolve_completed(
            self.start_time.elapsed(),
            bytes_scanned,
            relocated,
            unresolved,
        );
    }

    /// Record cancellation
    pub fn cancelled(self) {
        record_resolve_cancelled();
    }

    /// Record failure
    pub fn failed(self, reason: &str) {
        record_resolve_failed(reason);
    }
}
