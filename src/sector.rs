//! Sector request/result unit.
//!
//! A [`Sector`] travels the whole pipeline: created by the planner, queued
//! for the dispatcher, filled by a worker, merged by the ingestor, and
//! finally parked on the cleanup queue until its transient label images are
//! disposed.

use crate::coord::SectorKey;
use glam::{Mat4, Vec4};
use image::RgbaImage;

/// Lifecycle state of a sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorState {
    /// Enqueued for loading, reservation placed.
    Requested,
    /// Worker attached a payload.
    Loaded,
    /// Merged into the residency set.
    Resident,
    /// Removed before or after residency; payload dropped.
    Discarded,
}

/// Payload produced by a worker for one sector.
///
/// All parallel arrays are bounded by `count`; the source may hand back
/// longer buffers than it filled, so consumers must truncate to `count`.
#[derive(Debug, Default)]
pub struct SectorPayload {
    /// Number of valid records.
    pub count: usize,
    /// World positions, w carries the star-class image index or the
    /// excluded sentinel (negative).
    pub positions: Vec<Vec4>,
    /// Label text per record, possibly distance-annotated.
    pub labels: Vec<String>,
    /// Rendered label bitmaps, one per valid record. Transient: copied into
    /// the residency set's atlas on merge, then disposed via the cleanup
    /// queue.
    pub images: Vec<RgbaImage>,
    /// Per-record label placement matrices.
    pub transforms: Vec<Mat4>,
}

/// One request/result unit keyed by its grid cell.
#[derive(Debug)]
pub struct Sector {
    /// Grid cell this sector covers.
    pub key: SectorKey,
    /// Edge length of the queried cube.
    pub search_radius: i32,
    /// Lifecycle state.
    pub state: SectorState,
    /// Filled by the worker.
    pub payload: SectorPayload,
    /// Set when the source query failed; the ingestor releases the
    /// reservation so the cell can be re-requested later.
    pub load_failed: bool,
}

impl Sector {
    /// New sector in the `Requested` state with an empty payload.
    pub fn new(key: SectorKey, search_radius: i32) -> Self {
        Self {
            key,
            search_radius,
            state: SectorState::Requested,
            payload: SectorPayload::default(),
            load_failed: false,
        }
    }

    /// Drops the transient label bitmaps.
    ///
    /// Called when draining the cleanup queue; the persistent copies (if
    /// any) already live in the residency set's atlas.
    pub fn dispose_images(&mut self) {
        self.payload.images = Vec::new();
    }
}
