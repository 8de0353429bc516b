//! Settings structs. Pure data, no parsing.

use crate::placement::LabelStyle;
use std::collections::HashSet;
use std::time::Duration;

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Grid cell edge length in world units.
    pub cell_size: i32,
    /// Maximum concurrent sector loaders.
    pub max_workers: usize,
    /// Maximum requests outstanding before the planner stops issuing new
    /// nine-box requests. Two full nine-boxes by default.
    pub max_pending: usize,
    /// Hard cap on total resident records; exceeded only transiently
    /// between a merge and the next eviction pass.
    pub object_ceiling: usize,
    /// Eviction reduces to `object_ceiling - eviction_margin`, a hysteresis
    /// band against evict/re-request thrash at the boundary.
    pub eviction_margin: usize,
    /// Completed sectors merged per ingest tick at most.
    pub merge_burst: usize,
    /// Minimum time between ingest passes.
    pub merge_interval: Duration,
    /// Minimum time between foreground cleanup-queue drains.
    pub cleanup_interval: Duration,
    /// Annotate labels with distance from the cell centre.
    pub show_distance: bool,
    /// Label bitmap and placement settings.
    pub labels: LabelSettings,
    /// Raw source coordinates whose records are excluded: they keep a
    /// sentinel category tag and take the alternate label offset instead of
    /// being dropped.
    pub excluded: HashSet<[i64; 3]>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cell_size: 100,
            max_workers: 16,
            max_pending: 27 * 2,
            object_ceiling: 100_000,
            eviction_margin: 1000,
            merge_burst: 2,
            merge_interval: Duration::from_millis(50),
            cleanup_interval: Duration::from_secs(60),
            show_distance: false,
            labels: LabelSettings::default(),
            excluded: HashSet::new(),
        }
    }
}

/// Label bitmap dimensions and placement style.
#[derive(Debug, Clone)]
pub struct LabelSettings {
    /// Fixed label bitmap width in pixels.
    pub bitmap_width: u32,
    /// Fixed label bitmap height in pixels.
    pub bitmap_height: u32,
    /// Offsets, quad size and billboard recipe.
    pub style: LabelStyle,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            bitmap_width: 160,
            bitmap_height: 16,
            style: LabelStyle::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_shipping_tuning() {
        let s = EngineSettings::default();
        assert_eq!(s.cell_size, 100);
        assert_eq!(s.max_workers, 16);
        assert_eq!(s.max_pending, 54);
        assert_eq!(s.object_ceiling, 100_000);
        assert_eq!(s.eviction_margin, 1000);
        assert_eq!(s.merge_burst, 2);
        assert!(!s.show_distance);
        assert_eq!(s.labels.bitmap_width, 160);
        assert_eq!(s.labels.bitmap_height, 16);
    }
}
