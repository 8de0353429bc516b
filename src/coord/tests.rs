use super::*;
use glam::Vec3;
use proptest::prelude::*;

#[test]
fn test_snap_multiples_of_cell_after_offset() {
    // Snapped values differ from a grid multiple only by the fixed offset.
    let mm = GRID_OFFSET + 50;
    for x in [-3120.0, -100.0, -1.0, 0.0, 1.0, 99.0, 4321.5] {
        let s = snap(x, 100);
        assert_eq!((s as i64 + mm) % 100, 0, "snap({x}) = {s} not on grid");
    }
}

#[test]
fn test_snap_is_idempotent() {
    for x in [-25_000.5, -77.0, 0.0, 49.9, 50.0, 12_345.0] {
        let once = snap(x, 100);
        let twice = snap(once as f32, 100);
        assert_eq!(once, twice);
    }
}

#[test]
fn test_snap_no_seam_at_zero() {
    // Positions just either side of zero fall into adjacent cells exactly
    // once, not into the same cell twice (the classic truncation bug).
    let below = snap(-0.5, 100);
    let above = snap(0.5, 100);
    // -0.5 and 0.5 are both within half a cell of the origin, so they share
    // the origin-centred cell.
    assert_eq!(below, above);
    // A full cell away they differ by exactly one cell.
    assert_eq!(snap(-100.0, 100) + 100, snap(0.0, 100));
}

#[test]
fn test_snap_to_key_translation_by_whole_cells() {
    let base = snap_to_key(Vec3::new(12.0, -34.0, 56.0), 100);
    let moved = snap_to_key(Vec3::new(112.0, -134.0, 156.0), 100);
    assert_eq!(moved, base.offset(1, -1, 1, 100));
}

#[test]
fn test_key_equality_is_componentwise() {
    let a = SectorKey { x: 0, y: 0, z: 0 };
    let b = SectorKey { x: 0, y: 0, z: 100 };
    assert_ne!(a, b);
    assert_eq!(a, SectorKey { x: 0, y: 0, z: 0 });
}

#[test]
fn test_centre_of_cell() {
    let key = SectorKey {
        x: -150,
        y: 50,
        z: -50,
    };
    assert_eq!(key.centre(100), Vec3::new(-100.0, 100.0, 0.0));
}

proptest! {
    /// Any two points within the same half-open cell snap to the same key.
    #[test]
    fn prop_points_in_same_cell_share_key(
        cell in -400i64..400i64,
        // Margin inside the cell keeps f32 rounding of the offset sum from
        // crossing a boundary.
        a in 0.5f32..99.0f32,
        b in 0.5f32..99.0f32,
    ) {
        let mm = (GRID_OFFSET + 50) as f32;
        // Construct two points inside the cell whose snapped corner is
        // cell * 100 - mm.
        let base = (cell * 100) as f32 - mm;
        prop_assert_eq!(snap(base + a, 100), snap(base + b, 100));
    }

    /// Snapping is idempotent for arbitrary coordinates.
    #[test]
    fn prop_snap_idempotent(x in -50_000.0f32..50_000.0f32) {
        let once = snap(x, 100);
        prop_assert_eq!(snap(once as f32, 100), once);
    }
}
