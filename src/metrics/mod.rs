//! Metrics and observability module
//!
//! Records delta-resolution and patching metrics through the `metrics`
//! facade. The embedding application decides where they go by installing
//! an exporter; without one, every call is a no-op.
//!
//! Key metrics exposed:
//! - Resolve lifecycle (started, completed, cancelled, failed)
//! - Bytes scanned and scan throughput
//! - Blocks relocated vs left unresolved
//! - Patch execution (blocks copied locally vs fetched)

pub mod recorder;

pub use recorder::{init_metrics, ResolveMetrics};
