//! Grid coordinates and sector keys.
//!
//! The galaxy is carved into cubic sectors on a fixed grid. A [`SectorKey`]
//! is the integer corner of one cell and is the unit of request, load,
//! residency and eviction. Snapping uses floor division on an
//! offset-normalized coordinate so that negative positions land in the same
//! cell as their positive mirrors would, with no rounding seam at zero.

mod types;

#[cfg(test)]
mod tests;

pub use types::{SectorKey, INVALID_POS};

use glam::Vec3;

/// Base offset added before integer floor division when snapping.
///
/// Must exceed the largest coordinate magnitude ever mapped; galactic
/// coordinates are well inside +/-100 000 ly.
pub const GRID_OFFSET: i64 = 100_000;

/// Snaps a single coordinate onto the grid for the given cell size.
///
/// The half-cell term centres the grid on the offset origin so a viewpoint
/// sits in the middle of its cell rather than on a cell boundary.
#[inline]
pub fn snap(coord: f32, cell_size: i32) -> i32 {
    let mm = GRID_OFFSET + (cell_size / 2) as i64;
    // coord + mm is always positive, so `as i64` truncation is a floor.
    let shifted = (coord + mm as f32) as i64;
    (shifted / cell_size as i64 * cell_size as i64 - mm) as i32
}

/// Snaps a world position to the key of its containing sector.
#[inline]
pub fn snap_to_key(pos: Vec3, cell_size: i32) -> SectorKey {
    SectorKey {
        x: snap(pos.x, cell_size),
        y: snap(pos.y, cell_size),
        z: snap(pos.z, cell_size),
    }
}
