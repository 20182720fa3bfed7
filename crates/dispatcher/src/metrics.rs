//! Writer metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single frame writer
///
/// Updated from both the sensor delivery thread (skips outside the frame
/// window) and the writer task (writes, failures, stale frames).
#[derive(Debug, Default)]
pub struct WriterMetrics {
    /// Frames persisted
    written: AtomicU64,
    /// Write or encode failures
    failed: AtomicU64,
    /// Frames outside the window or not newer than the last written one
    skipped: AtomicU64,
    /// Last written frame + 1 (0 = nothing written yet)
    last_frame: AtomicU64,
}

impl WriterMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a persisted frame
    pub fn record_written(&self, frame: u64) {
        self.written.fetch_add(1, Ordering::Relaxed);
        self.last_frame.fetch_max(frame + 1, Ordering::Relaxed);
    }

    /// Increment failure count
    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment skipped count
    pub fn inc_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total written count
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Get failure count
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Get skipped count
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Last written frame index
    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame.load(Ordering::Relaxed).checked_sub(1)
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> WriterSnapshot {
        WriterSnapshot {
            written: self.written(),
            failed: self.failed(),
            skipped: self.skipped(),
            last_frame: self.last_frame(),
        }
    }
}

/// Snapshot of writer metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterSnapshot {
    pub written: u64,
    pub failed: u64,
    pub skipped: u64,
    pub last_frame: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_frame_starts_empty() {
        let metrics = WriterMetrics::new();
        assert_eq!(metrics.last_frame(), None);

        metrics.record_written(0);
        assert_eq!(metrics.last_frame(), Some(0));
        metrics.record_written(42);
        assert_eq!(metrics.snapshot().last_frame, Some(42));
        assert_eq!(metrics.written(), 2);
    }
}
