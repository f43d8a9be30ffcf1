//! Lightweight in-process metrics.
//!
//! Counters, gauges and histograms are stored as atomics and rendered in the
//! Prometheus text format on demand (the binary logs them on shutdown).

pub mod metrics;

pub use metrics::KioskMetrics;
