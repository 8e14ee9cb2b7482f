//! Dispatch counters shared by both pool variants.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Atomic dispatch counters.
#[derive(Default)]
pub struct PoolStats {
    executed: AtomicUsize,
    failed: AtomicUsize,
    dropped: AtomicUsize,
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    /// Tasks handed to a unit.
    pub executed: usize,
    /// Per-unit execute refusals observed while scanning candidates.
    pub failed: usize,
    /// Tasks refused at submit or abandoned after re-enqueue retries.
    pub dropped: usize,
}

impl PoolStats {
    pub(crate) fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
