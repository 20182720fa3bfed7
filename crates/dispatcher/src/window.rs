//! FrameWindow - gate between sensor callbacks and writer queues
//!
//! A run persists the half-open frame range `[baseline, baseline + budget)`.
//! The baseline is only known after both sensors are listening, so the window
//! starts closed and every frame delivered before `open` is discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared frame window
#[derive(Debug, Default)]
pub struct FrameWindow {
    open: AtomicBool,
    start: AtomicU64,
    end: AtomicU64,
}

impl FrameWindow {
    /// Closed window
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the window at `baseline` for `budget` frames; returns the exclusive end
    pub fn open(&self, baseline: u64, budget: u64) -> u64 {
        let end = baseline.saturating_add(budget);
        self.start.store(baseline, Ordering::Relaxed);
        self.end.store(end, Ordering::Relaxed);
        // Release publishes the bounds to callback threads
        self.open.store(true, Ordering::Release);
        end
    }

    /// Whether the window has been opened
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Window bounds, None while closed
    pub fn bounds(&self) -> Option<(u64, u64)> {
        self.is_open().then(|| {
            (
                self.start.load(Ordering::Relaxed),
                self.end.load(Ordering::Relaxed),
            )
        })
    }

    /// Whether `frame` should be persisted
    pub fn contains(&self, frame: u64) -> bool {
        self.bounds()
            .is_some_and(|(start, end)| (start..end).contains(&frame))
    }
}
