//! Sector key type definitions.

use glam::Vec3;
use std::fmt;

/// Sentinel viewpoint used when no position has been tracked yet.
///
/// Far outside any reachable coordinate, so the first conditional request
/// always sees "moved at least one cell".
pub const INVALID_POS: Vec3 = Vec3::new(-1_000_000.0, -1_000_000.0, -1_000_000.0);

/// Integer corner of a cubic sector on the streaming grid.
///
/// Two keys are equal iff all three components match exactly; every key is
/// produced by [`snap`](super::snap) (or truncation for the single
/// box-around sector), so equality is structural rather than a float
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SectorKey {
    /// Key from an already-gridded corner position (no snapping).
    ///
    /// Used for the single box-around sector, whose corner is the viewpoint
    /// minus half the search size rather than a grid multiple.
    #[inline]
    pub fn from_corner(pos: Vec3) -> Self {
        Self {
            x: pos.x as i32,
            y: pos.y as i32,
            z: pos.z as i32,
        }
    }

    /// Minimum (corner) world position of the sector.
    #[inline]
    pub fn min_corner(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    /// World-space centre of the cell for a given search size.
    #[inline]
    pub fn centre(&self, size: i32) -> Vec3 {
        self.min_corner() + Vec3::splat(size as f32 / 2.0)
    }

    /// Neighboring key displaced by whole cells along each axis.
    #[inline]
    pub fn offset(&self, dx: i32, dy: i32, dz: i32, cell_size: i32) -> Self {
        Self {
            x: self.x + dx * cell_size,
            y: self.y + dy * cell_size,
            z: self.z + dz * cell_size,
        }
    }
}

impl fmt::Display for SectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
