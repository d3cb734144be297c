//! Logger metrics for observability
//!
//! Counts how many records passed the threshold, how many were filtered out,
//! and how many destination deliveries failed.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by every [`Logger`](crate::Logger)
///
/// # Example
///
/// ```
/// use rust_fanout_logger::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// metrics.record_accepted();
/// metrics.record_filtered();
/// metrics.record_failed_emits(2);
///
/// assert_eq!(metrics.accepted(), 1);
/// assert_eq!(metrics.filtered(), 1);
/// assert_eq!(metrics.failed_emits(), 2);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Records at or above the threshold, handed to the destinations
    accepted: AtomicU64,

    /// Records below the threshold
    filtered: AtomicU64,

    /// Per-destination emit failures
    failed_emits: AtomicU64,
}

impl LoggerMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            failed_emits: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_emits(&self) -> u64 {
        self.failed_emits.load(Ordering::Relaxed)
    }

    /// Record an accepted record, returning the previous count
    #[inline]
    pub fn record_accepted(&self) -> u64 {
        self.accepted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_filtered(&self) -> u64 {
        self.filtered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed_emits(&self, count: usize) -> u64 {
        self.failed_emits.fetch_add(count as u64, Ordering::Relaxed)
    }

    /// Share of accepted records among all records seen (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been logged.
    pub fn acceptance_rate(&self) -> f64 {
        let accepted = self.accepted() as f64;
        let total = accepted + self.filtered() as f64;
        if total == 0.0 {
            0.0
        } else {
            (accepted / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.accepted.store(0, Ordering::Relaxed);
        self.filtered.store(0, Ordering::Relaxed);
        self.failed_emits.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            accepted: AtomicU64::new(self.accepted()),
            filtered: AtomicU64::new(self.filtered()),
            failed_emits: AtomicU64::new(self.failed_emits()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.accepted(), 0);
        assert_eq!(metrics.filtered(), 0);
        assert_eq!(metrics.failed_emits(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.record_accepted(), 0);
        assert_eq!(metrics.record_accepted(), 1);
        assert_eq!(metrics.accepted(), 2);
    }

    #[test]
    fn test_acceptance_rate() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.acceptance_rate(), 0.0);

        for _ in 0..3 {
            metrics.record_accepted();
        }
        metrics.record_filtered();

        assert!((metrics.acceptance_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = LoggerMetrics::new();
        metrics.record_accepted();
        metrics.record_filtered();
        metrics.record_failed_emits(3);

        metrics.reset();

        assert_eq!(metrics.accepted(), 0);
        assert_eq!(metrics.filtered(), 0);
        assert_eq!(metrics.failed_emits(), 0);
    }

    #[test]
    fn test_metrics_clone_is_snapshot() {
        let metrics = LoggerMetrics::new();
        metrics.record_accepted();

        let snapshot = metrics.clone();
        metrics.record_accepted();

        assert_eq!(metrics.accepted(), 2);
        assert_eq!(snapshot.accepted(), 1);
    }
}
