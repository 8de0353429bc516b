//! Request planner: turns viewpoint movement into sector requests.
//!
//! Foreground-only. Tracks the last position a wide-area request was issued
//! for, debounces new nine-box requests by cell size, and applies the
//! max-pending backpressure guard before queueing more work.

use crate::coord::{snap_to_key, SectorKey, INVALID_POS};
use crate::queue::RequestQueue;
use crate::residency::ResidencySet;
use glam::Vec3;
use tracing::debug;

/// Plans which grid cells to request as the viewpoint moves.
#[derive(Debug)]
pub struct RequestPlanner {
    cell_size: i32,
    max_pending: usize,
    /// Viewpoint of the last issued request; `INVALID_POS` when untracked.
    current_pos: Vec3,
    /// Search size of the last box-around request, kept for its removal.
    previous_box_size: i32,
}

impl RequestPlanner {
    pub fn new(cell_size: i32, max_pending: usize) -> Self {
        Self {
            cell_size,
            max_pending,
            current_pos: INVALID_POS,
            previous_box_size: 0,
        }
    }

    /// Viewpoint the planner currently tracks.
    pub fn current_pos(&self) -> Vec3 {
        self.current_pos
    }

    /// Requests a single cell of edge `size` centred on `pos`,
    /// unconditionally (no debounce, no backpressure guard), and records it
    /// as "the box" for a later [`clear_box_around`](Self::clear_box_around).
    pub fn request_box_around(
        &mut self,
        residency: &mut ResidencySet,
        queue: &RequestQueue,
        pos: Vec3,
        size: i32,
    ) {
        self.current_pos = pos;
        self.previous_box_size = size;
        let key = SectorKey::from_corner(pos - Vec3::splat(size as f32 / 2.0));
        debug!(%key, size, "box-around request");
        queue.request(residency, key, size);
    }

    /// Removes the previously requested box-around cell and resets the
    /// tracked viewpoint to the invalid sentinel.
    ///
    /// The cell's load may still be in flight; the ingestor's staleness
    /// check drops the result when it lands.
    pub fn clear_box_around(&mut self, residency: &mut ResidencySet) {
        let key = SectorKey::from_corner(
            self.current_pos - Vec3::splat(self.previous_box_size as f32 / 2.0),
        );
        debug!(%key, "box-around cleared");
        residency.remove(&key);
        self.current_pos = INVALID_POS;
    }

    /// Requests the 3x3 neighborhood of `pos` at three vertical layers
    /// (centre, +cell, -cell): up to 27 cells, deduplicated per cell.
    pub fn request_nine_box(
        &mut self,
        residency: &mut ResidencySet,
        queue: &RequestQueue,
        pos: Vec3,
    ) {
        let centre = snap_to_key(pos, self.cell_size);
        for dy in [0, 1, -1] {
            for dx in -1..=1 {
                for dz in -1..=1 {
                    let key = centre.offset(dx, dy, dz, self.cell_size);
                    queue.request(residency, key, self.cell_size);
                }
            }
        }
    }

    /// Issues a new nine-box request only if the viewpoint moved at least
    /// one cell since the last request AND fewer than the configured
    /// maximum of requests are pending. Returns whether a request was
    /// issued.
    pub fn request_box_conditional(
        &mut self,
        residency: &mut ResidencySet,
        queue: &RequestQueue,
        newpos: Vec3,
    ) -> bool {
        let moved = (self.current_pos - newpos).length() >= self.cell_size as f32;
        if !moved || queue.pending() >= self.max_pending {
            return false;
        }
        debug!(
            x = newpos.x,
            y = newpos.y,
            z = newpos.z,
            pending = queue.pending(),
            "nine-box request"
        );
        self.request_nine_box(residency, queue, newpos);
        self.current_pos = newpos;
        true
    }

    /// Forgets the tracked viewpoint without touching the residency set.
    pub fn reset(&mut self) {
        self.current_pos = INVALID_POS;
    }
}
