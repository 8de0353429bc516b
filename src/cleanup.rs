//! Disposal queue for transient label bitmaps.
//!
//! Sectors land here once the ingestor has copied (or decided to drop)
//! their label images. Both the dispatcher, each time it wakes, and the
//! foreground tick, on its slow interval, drain the queue; one mutex guards
//! the whole drain so the two sides never dispose the same sector twice.

use crate::sector::Sector;
use crate::stats::StreamStats;
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use tracing::trace;

/// Mutex-guarded queue of sectors awaiting bitmap disposal.
#[derive(Debug, Default)]
pub struct CleanupQueue {
    inner: Mutex<VecDeque<Sector>>,
}

impl CleanupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a sector for deferred disposal.
    pub fn push(&self, sector: Sector) {
        self.inner.lock().expect("cleanup queue poisoned").push_back(sector);
    }

    /// Disposes every queued sector's bitmaps.
    ///
    /// The lock is held across the full drain; callers on either thread get
    /// disjoint batches.
    pub fn drain(&self, stats: &StreamStats) -> usize {
        let mut queue = self.inner.lock().expect("cleanup queue poisoned");
        let mut disposed: usize = 0;
        while let Some(mut sector) = queue.pop_front() {
            trace!(key = %sector.key, "disposing label bitmaps");
            sector.dispose_images();
            disposed += 1;
        }
        if disposed > 0 {
            stats.cleaned.fetch_add(disposed as u64, Ordering::Relaxed);
        }
        disposed
    }

    /// Number of sectors waiting for disposal.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cleanup queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
