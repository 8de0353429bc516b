//! Foreground merge of completed sectors into the residency set.
//!
//! Runs on the caller's update tick, never on the worker side: the
//! residency set is foreground-owned, so merging here is what keeps it
//! lock-free. Merges are rate-limited (a minimum interval between merge
//! passes, a small burst per pass) so a flood of completions cannot stall a
//! render frame, and the object ceiling is enforced right after each pass.

use crate::cleanup::CleanupQueue;
use crate::config::EngineSettings;
use crate::label::LabelAtlas;
use crate::residency::{ResidencySet, ResidentSector};
use crate::sector::{Sector, SectorState};
use crate::stats::StreamStats;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Merges worker results into the residency set on the foreground tick.
pub(crate) struct ResultIngestor {
    settings: Arc<EngineSettings>,
    /// None until the first merge pass, so that pass is never gated.
    last_merge: Option<Instant>,
    last_cleanup: Instant,
}

impl ResultIngestor {
    pub fn new(settings: Arc<EngineSettings>) -> Self {
        Self {
            settings,
            last_merge: None,
            last_cleanup: Instant::now(),
        }
    }

    /// One foreground tick: merge up to the configured burst, enforce the
    /// object ceiling, and occasionally drain the cleanup queue.
    ///
    /// Returns the number of sectors merged this tick.
    pub fn tick(
        &mut self,
        residency: &mut ResidencySet,
        completed_rx: &mut mpsc::UnboundedReceiver<Sector>,
        cleanup: &CleanupQueue,
        stats: &StreamStats,
    ) -> usize {
        let mut merged = 0;
        let due = self
            .last_merge
            .map_or(true, |t| t.elapsed() >= self.settings.merge_interval);
        if due {
            self.last_merge = Some(Instant::now());
            for _ in 0..self.settings.merge_burst {
                let Ok(sector) = completed_rx.try_recv() else {
                    break;
                };
                if self.ingest(sector, residency, cleanup, stats) {
                    merged += 1;
                }
            }
            if merged > 0 {
                self.enforce_ceiling(residency, stats);
            }
        }

        if self.last_cleanup.elapsed() >= self.settings.cleanup_interval {
            self.last_cleanup = Instant::now();
            cleanup.drain(stats);
        }
        merged
    }

    /// Routes one completed sector. Returns true if it became resident.
    fn ingest(
        &self,
        mut sector: Sector,
        residency: &mut ResidencySet,
        cleanup: &CleanupQueue,
        stats: &StreamStats,
    ) -> bool {
        let key = sector.key;

        if sector.load_failed {
            // Release the reservation so the cell can be retried later.
            residency.release(&key);
            sector.state = SectorState::Discarded;
            trace!(%key, "failed sector discarded, reservation released");
            return false;
        }

        if !residency.contains(&key) {
            // Cleared between request and completion; late payload is junk
            // but its bitmaps still need disposal off the hot path.
            stats.dropped_stale.fetch_add(1, Ordering::Relaxed);
            trace!(%key, "stale result dropped");
            if !sector.payload.images.is_empty() {
                sector.state = SectorState::Discarded;
                cleanup.push(sector);
            }
            return false;
        }

        let count = sector.payload.count;
        if count == 0 {
            // Known-empty cell: keep the reservation so it is never
            // re-queried while still wanted.
            trace!(%key, "empty sector, reservation kept");
            return false;
        }

        let payload = &mut sector.payload;
        let resident = ResidentSector {
            count,
            positions: payload.positions.drain(..count.min(payload.positions.len())).collect(),
            labels: payload.labels.drain(..count.min(payload.labels.len())).collect(),
            transforms: payload
                .transforms
                .drain(..count.min(payload.transforms.len()))
                .collect(),
            atlas: LabelAtlas::from_images(&payload.images),
        };
        residency.add(key, resident);
        stats.merged.fetch_add(1, Ordering::Relaxed);
        trace!(%key, records = count, "sector merged");

        // Originals were copied into the atlas; dispose them later.
        sector.state = SectorState::Resident;
        cleanup.push(sector);
        true
    }

    /// Evicts oldest sectors once the ceiling is crossed, down to the
    /// ceiling minus the margin so eviction does not run every tick.
    fn enforce_ceiling(&self, residency: &mut ResidencySet, stats: &StreamStats) {
        let ceiling = self.settings.object_ceiling;
        if residency.object_count() > ceiling {
            let target = ceiling.saturating_sub(self.settings.eviction_margin);
            let evicted = residency.remove_until(target);
            stats.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(
                evicted,
                objects = residency.object_count(),
                "object ceiling enforced"
            );
        }
    }
}
