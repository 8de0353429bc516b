//! Request queue and reservation.
//!
//! The single entry point for fetch requests. A request is dropped silently
//! when its key is already reserved or resident - that check plus the
//! synchronous reservation insert is what closes the race where two rapid
//! requests for the same cell both pass dedup before either completes.
//! Capacity limiting is the planner's job (request-rate policy), not the
//! queue's; the channel itself is unbounded.

use crate::coord::SectorKey;
use crate::residency::ResidencySet;
use crate::sector::Sector;
use crate::stats::StreamStats;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Sender side of the request pipeline.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    tx: mpsc::UnboundedSender<Sector>,
    /// Requests enqueued but not yet taken by the dispatcher. Drives the
    /// planner's backpressure guard.
    pending: Arc<AtomicUsize>,
    stats: Arc<StreamStats>,
}

impl RequestQueue {
    /// Creates the queue pair. The receiver goes to the dispatcher.
    pub fn new(stats: Arc<StreamStats>) -> (Self, mpsc::UnboundedReceiver<Sector>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                pending: Arc::new(AtomicUsize::new(0)),
                stats,
            },
            rx,
        )
    }

    /// Reserves `key` and enqueues a fetch for it.
    ///
    /// Dropped silently if the key is already reserved or resident. Returns
    /// whether a request was actually enqueued.
    pub fn request(&self, residency: &mut ResidencySet, key: SectorKey, radius: i32) -> bool {
        if residency.contains(&key) {
            trace!(%key, "request rejected, already reserved or resident");
            self.stats.deduplicated.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        // Reserve before the send so a second request issued this tick
        // already sees the key taken.
        residency.reserve(key);
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(Sector::new(key, radius)).is_err() {
            // Dispatcher is gone (shutdown); roll back so the set does not
            // carry a reservation nothing will ever fill.
            residency.release(&key);
            self.pending.fetch_sub(1, Ordering::SeqCst);
            debug!(%key, "request dropped, dispatcher stopped");
            return false;
        }
        self.stats.requested.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Requests still waiting to be taken by the dispatcher.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Shared pending counter, decremented by the dispatcher on take.
    pub(crate) fn pending_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: i32) -> SectorKey {
        SectorKey { x, y: 0, z: 0 }
    }

    #[test]
    fn test_request_reserves_and_enqueues() {
        let stats = Arc::new(StreamStats::default());
        let (queue, mut rx) = RequestQueue::new(Arc::clone(&stats));
        let mut residency = ResidencySet::new();

        assert!(queue.request(&mut residency, key(1), 100));
        assert!(residency.contains(&key(1)));
        assert_eq!(queue.pending(), 1);

        let sector = rx.try_recv().expect("sector queued");
        assert_eq!(sector.key, key(1));
        assert_eq!(sector.search_radius, 100);
    }

    #[test]
    fn test_duplicate_request_dropped_silently() {
        let stats = Arc::new(StreamStats::default());
        let (queue, mut rx) = RequestQueue::new(Arc::clone(&stats));
        let mut residency = ResidencySet::new();

        assert!(queue.request(&mut residency, key(1), 100));
        assert!(!queue.request(&mut residency, key(1), 100));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "only one sector queued");
        assert_eq!(stats.snapshot().deduplicated, 1);
        assert_eq!(stats.snapshot().requested, 1);
    }

    #[test]
    fn test_closed_channel_rolls_back_reservation() {
        let stats = Arc::new(StreamStats::default());
        let (queue, rx) = RequestQueue::new(stats);
        drop(rx);
        let mut residency = ResidencySet::new();

        assert!(!queue.request(&mut residency, key(1), 100));
        assert!(!residency.contains(&key(1)), "reservation rolled back");
        assert_eq!(queue.pending(), 0);
    }
}
