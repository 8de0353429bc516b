//! Streaming statistics for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared across the planner, dispatcher, workers and ingestor.
#[derive(Debug, Default)]
pub struct StreamStats {
    /// Sectors accepted onto the request queue.
    pub requested: AtomicU64,
    /// Requests dropped because the key was already reserved or resident.
    pub deduplicated: AtomicU64,
    /// Sectors filled by workers (including empty results).
    pub loaded: AtomicU64,
    /// Source queries that failed and were degraded to empty payloads.
    pub load_failures: AtomicU64,
    /// Sectors merged into the residency set.
    pub merged: AtomicU64,
    /// Completed payloads dropped because the key was no longer wanted.
    pub dropped_stale: AtomicU64,
    /// Sectors evicted by the object ceiling.
    pub evicted: AtomicU64,
    /// Sectors whose transient bitmaps were disposed.
    pub cleaned: AtomicU64,
}

impl StreamStats {
    /// Snapshot the current counters.
    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            requested: self.requested.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            loaded: self.loaded.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            merged: self.merged.load(Ordering::Relaxed),
            dropped_stale: self.dropped_stale.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            cleaned: self.cleaned.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`StreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStatsSnapshot {
    pub requested: u64,
    pub deduplicated: u64,
    pub loaded: u64,
    pub load_failures: u64,
    pub merged: u64,
    pub dropped_stale: u64,
    pub evicted: u64,
    pub cleaned: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = StreamStats::default();
        stats.requested.fetch_add(3, Ordering::Relaxed);
        stats.deduplicated.fetch_add(1, Ordering::Relaxed);
        let snap = stats.snapshot();
        assert_eq!(snap.requested, 3);
        assert_eq!(snap.deduplicated, 1);
        assert_eq!(snap.merged, 0);
    }
}
