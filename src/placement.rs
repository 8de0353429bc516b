//! Per-record label placement transforms.
//!
//! Each star label gets one instance matrix: translation to the star's world
//! position plus a style offset (an alternate offset applies when the record
//! carries the excluded sentinel), and the label quad scale. The w lanes of
//! the basis columns carry per-instance control values consumed by the
//! vertex stage - billboard flag, elevation flag, image layer index - and
//! `w_axis.w` is the visibility flag. Affine consumers must ignore those
//! lanes.

use glam::{Mat4, Vec3, Vec4};

/// Style inputs for label placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelStyle {
    /// Offset from the star position to the label anchor.
    pub offset: Vec3,
    /// Extra offset added for excluded records (stacked on `offset`).
    pub excluded_offset: Vec3,
    /// Label quad scale.
    pub size: Vec3,
    /// Face the viewer (billboard) at render time.
    pub rotate_to_viewer: bool,
    /// Tilt with viewer elevation; off keeps labels upright.
    pub rotate_elevation: bool,
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            offset: Vec3::new(0.0, -1.0, 0.0),
            excluded_offset: Vec3::new(0.0, -1.2, 0.0),
            size: Vec3::new(5.0, 0.0, 5.0 / 4.0),
            rotate_to_viewer: true,
            rotate_elevation: false,
        }
    }
}

/// Builds the placement matrix for one record.
///
/// `position.w` selects the offset: negative (excluded sentinel) stacks the
/// excluded offset on the primary one. The layer index defaults to the
/// record's class image index and is clamped to zero for excluded records.
pub fn placement_matrix(position: Vec4, style: &LabelStyle) -> Mat4 {
    let offset = if position.w < 0.0 {
        style.excluded_offset + style.offset
    } else {
        style.offset
    };
    let mut m =
        Mat4::from_translation(position.truncate() + offset) * Mat4::from_scale(style.size);
    m.x_axis.w = if style.rotate_to_viewer { 1.0 } else { 0.0 };
    m.y_axis.w = if style.rotate_elevation { 1.0 } else { 0.0 };
    m.z_axis.w = position.w.max(0.0);
    m.w_axis.w = 1.0;
    m
}

/// Builds placement matrices for the first `count` records.
///
/// `positions` may be longer than `count`; only the valid prefix is used.
pub fn label_transforms(positions: &[Vec4], style: &LabelStyle, count: usize) -> Vec<Mat4> {
    positions[..count.min(positions.len())]
        .iter()
        .map(|&p| placement_matrix(p, style))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_offset_translation() {
        let style = LabelStyle::default();
        let m = placement_matrix(Vec4::new(10.0, 20.0, 30.0, 2.0), &style);
        let t = m.w_axis.truncate();
        assert_eq!(t, Vec3::new(10.0, 19.0, 30.0));
        // Scale on the diagonal.
        assert_eq!(m.x_axis.x, 5.0);
        assert_eq!(m.z_axis.z, 5.0 / 4.0);
    }

    #[test]
    fn test_excluded_offset_stacks() {
        let style = LabelStyle::default();
        let m = placement_matrix(Vec4::new(0.0, 0.0, 0.0, -1.0), &style);
        let t = m.w_axis.truncate();
        assert!((t.y - (-2.2)).abs() < 1e-6);
        // Excluded records clamp the image layer to zero.
        assert_eq!(m.z_axis.w, 0.0);
    }

    #[test]
    fn test_control_lanes() {
        let style = LabelStyle::default();
        let m = placement_matrix(Vec4::new(0.0, 0.0, 0.0, 7.0), &style);
        assert_eq!(m.x_axis.w, 1.0, "billboard flag");
        assert_eq!(m.y_axis.w, 0.0, "no elevation tilt");
        assert_eq!(m.z_axis.w, 7.0, "image layer from class index");
        assert_eq!(m.w_axis.w, 1.0, "visible");
    }

    #[test]
    fn test_transforms_truncate_to_count() {
        let style = LabelStyle::default();
        let positions = vec![Vec4::ZERO; 8];
        assert_eq!(label_transforms(&positions, &style, 3).len(), 3);
        assert_eq!(label_transforms(&positions, &style, 20).len(), 8);
    }
}
