//! External spatial data source seam.
//!
//! The engine never talks to a database directly; it calls
//! [`StarSource::query_cells`] with the cell bounds and two callbacks: a
//! record mapper that turns raw database coordinates and a star class into a
//! render position, and an optional label annotator. Implementations must be
//! safe to call concurrently from multiple workers.

use glam::Vec4;
use thiserror::Error;

/// Raw database coordinates are fixed-point; divide by this to reach world
/// light-year units.
pub const POSITION_SCALE: f64 = 128.0;

/// Category tag written into a position's w component for records on the
/// exclusion list. Negative, so renderers can branch on `w < 0`.
pub const EXCLUDED_CLASS: f32 = -1.0;

/// Star classification index as stored by the source.
///
/// Doubles as the index into the renderer's star image array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StarClass(pub u32);

/// Maps one raw record to a render position.
///
/// Arguments are the raw fixed-point coordinates and the star class; the
/// returned `Vec4` is the world position with the class image index (or the
/// excluded sentinel) in w.
pub type RecordMapper<'a> = dyn Fn(i64, i64, i64, StarClass) -> Vec4 + Sync + 'a;

/// Optionally rewrites a record's label given its mapped position.
pub type LabelAnnotator<'a> = dyn Fn(Vec4, &str) -> String + Sync + 'a;

/// Result of one cell query.
///
/// `count` bounds the parallel arrays; the source may return longer buffers
/// than it filled.
#[derive(Debug, Default)]
pub struct CellQuery {
    /// Number of valid records.
    pub count: usize,
    /// Mapped positions, w = class image index or excluded sentinel.
    pub positions: Vec<Vec4>,
    /// Label strings, already annotated if an annotator was supplied.
    pub labels: Vec<String>,
}

/// Errors surfaced by a spatial data source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store rejected or failed the query.
    #[error("sector query failed: {0}")]
    Query(String),
    /// The source is shutting down or unreachable.
    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

/// The spatial data source queried per sector.
///
/// `min_*` is the cell's minimum corner in world units and `size` its edge
/// length. The mapper runs once per record; the annotator, when present,
/// runs once per record after mapping.
pub trait StarSource: Send + Sync {
    fn query_cells(
        &self,
        min_x: f32,
        min_y: f32,
        min_z: f32,
        size: i32,
        map: &RecordMapper<'_>,
        annotate: Option<&LabelAnnotator<'_>>,
    ) -> Result<CellQuery, SourceError>;
}
