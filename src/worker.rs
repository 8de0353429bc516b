//! Sector loader: one short-lived task per requested sector.
//!
//! The dispatcher hands each taken sector to [`spawn_loader`] together with
//! an already-acquired worker permit. The synchronous source query runs on
//! the blocking pool so its latency never stalls the dispatcher, and the
//! in-flight count decrements exactly once on every path, panic included,
//! via the drop guard that owns the permit.

use crate::config::EngineSettings;
use crate::label::LabelRasterizer;
use crate::placement::label_transforms;
use crate::sector::{Sector, SectorState};
use crate::source::{StarClass, StarSource, EXCLUDED_CLASS, POSITION_SCALE};
use crate::stats::StreamStats;
use glam::Vec4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{error, trace, warn};

/// Everything a loader needs besides the sector itself.
pub(crate) struct LoadContext {
    pub source: Arc<dyn StarSource>,
    pub rasterizer: Arc<dyn LabelRasterizer>,
    pub settings: Arc<EngineSettings>,
    pub stats: Arc<StreamStats>,
}

/// Holds one worker slot and the committed in-flight count.
///
/// Dropping the guard decrements the count and then releases the permit,
/// in that order, so the count never reads below the slots actually free.
pub(crate) struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl InFlightGuard {
    /// Takes the slot: increments the count before any worker code runs.
    pub fn new(in_flight: Arc<AtomicUsize>, permit: OwnedSemaphorePermit) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            in_flight,
            _permit: permit,
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawns the loader task for one sector.
pub(crate) fn spawn_loader(
    sector: Sector,
    ctx: Arc<LoadContext>,
    completed_tx: mpsc::UnboundedSender<Sector>,
    guard: InFlightGuard,
) {
    tokio::spawn(async move {
        let key = sector.key;
        let radius = sector.search_radius;

        let blocking_ctx = Arc::clone(&ctx);
        let filled = match tokio::task::spawn_blocking(move || fill_sector(sector, &blocking_ctx))
            .await
        {
            Ok(filled) => filled,
            Err(join_err) => {
                // A panicking source must not take the engine down; degrade
                // to a failed empty sector so the reservation gets released.
                error!(%key, error = %join_err, "sector loader panicked");
                ctx.stats.load_failures.fetch_add(1, Ordering::Relaxed);
                let mut failed = Sector::new(key, radius);
                failed.load_failed = true;
                failed
            }
        };

        // The ingestor may already be gone during shutdown; the payload
        // just drops then.
        let _ = completed_tx.send(filled);
        drop(guard);
    });
}

/// Queries and builds the payload for one sector. Synchronous; runs on the
/// blocking pool.
///
/// A failed query is logged, degraded to an empty payload and flagged so
/// the ingestor releases the reservation.
pub(crate) fn fill_sector(mut sector: Sector, ctx: &LoadContext) -> Sector {
    let settings = &ctx.settings;
    let excluded = &settings.excluded;
    let map = |x: i64, y: i64, z: i64, class: StarClass| -> Vec4 {
        let w = if excluded.contains(&[x, y, z]) {
            EXCLUDED_CLASS
        } else {
            class.0 as f32
        };
        Vec4::new(
            (x as f64 / POSITION_SCALE) as f32,
            (y as f64 / POSITION_SCALE) as f32,
            (z as f64 / POSITION_SCALE) as f32,
            w,
        )
    };

    let min = sector.key.min_corner();
    let result = if settings.show_distance {
        let centre = sector.key.centre(sector.search_radius);
        let annotate = move |pos: Vec4, label: &str| {
            let dist = (centre - pos.truncate()).length();
            format!("{label} @ {dist:.1}ly")
        };
        ctx.source.query_cells(
            min.x,
            min.y,
            min.z,
            sector.search_radius,
            &map,
            Some(&annotate),
        )
    } else {
        ctx.source
            .query_cells(min.x, min.y, min.z, sector.search_radius, &map, None)
    };

    match result {
        Ok(query) => {
            // The source may hand back longer buffers than it filled.
            let count = query.count.min(query.positions.len()).min(query.labels.len());
            if count > 0 {
                sector.payload.images = ctx.rasterizer.rasterize(
                    &query.labels,
                    count,
                    settings.labels.bitmap_width,
                    settings.labels.bitmap_height,
                );
                sector.payload.transforms =
                    label_transforms(&query.positions, &settings.labels.style, count);
            }
            sector.payload.count = count;
            sector.payload.positions = query.positions;
            sector.payload.labels = query.labels;
            sector.state = SectorState::Loaded;
            ctx.stats.loaded.fetch_add(1, Ordering::Relaxed);
            trace!(key = %sector.key, records = count, "sector loaded");
        }
        Err(err) => {
            warn!(key = %sector.key, error = %err, "sector query failed");
            sector.load_failed = true;
            ctx.stats.load_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
    sector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::SectorKey;
    use crate::label::PlaceholderRasterizer;
    use crate::source::{CellQuery, LabelAnnotator, RecordMapper, SourceError};

    /// Source yielding fixed raw records, or a forced error.
    struct FakeSource {
        records: Vec<([i64; 3], StarClass, &'static str)>,
        fail: bool,
    }

    impl StarSource for FakeSource {
        fn query_cells(
            &self,
            _min_x: f32,
            _min_y: f32,
            _min_z: f32,
            _size: i32,
            map: &RecordMapper<'_>,
            annotate: Option<&LabelAnnotator<'_>>,
        ) -> Result<CellQuery, SourceError> {
            if self.fail {
                return Err(SourceError::Query("disk on fire".to_string()));
            }
            let mut q = CellQuery::default();
            for ([x, y, z], class, name) in &self.records {
                let pos = map(*x, *y, *z, *class);
                let label = match annotate {
                    Some(f) => f(pos, name),
                    None => (*name).to_string(),
                };
                q.positions.push(pos);
                q.labels.push(label);
            }
            q.count = self.records.len();
            // Padding beyond count, as a real source may return.
            q.positions.push(Vec4::ZERO);
            q.labels.push(String::new());
            Ok(q)
        }
    }

    fn ctx(source: FakeSource, settings: EngineSettings) -> LoadContext {
        LoadContext {
            source: Arc::new(source),
            rasterizer: Arc::new(PlaceholderRasterizer),
            settings: Arc::new(settings),
            stats: Arc::new(StreamStats::default()),
        }
    }

    fn key() -> SectorKey {
        SectorKey { x: 0, y: 0, z: 0 }
    }

    #[test]
    fn test_fill_builds_parallel_arrays() {
        let source = FakeSource {
            records: vec![
                ([1280, 0, 0], StarClass(2), "Achenar"),
                ([0, 1280, 0], StarClass(5), "Sol"),
            ],
            fail: false,
        };
        let ctx = ctx(source, EngineSettings::default());
        let sector = fill_sector(Sector::new(key(), 100), &ctx);

        assert_eq!(sector.state, SectorState::Loaded);
        assert_eq!(sector.payload.count, 2);
        assert_eq!(sector.payload.images.len(), 2);
        assert_eq!(sector.payload.transforms.len(), 2);
        // Arrays may be longer than count; count is the bound.
        assert!(sector.payload.positions.len() >= 2);
        assert_eq!(sector.payload.positions[0].truncate().x, 10.0);
        assert_eq!(sector.payload.positions[0].w, 2.0);
    }

    #[test]
    fn test_excluded_record_gets_sentinel_tag() {
        let mut settings = EngineSettings::default();
        settings.excluded.insert([1280, 0, 0]);
        let source = FakeSource {
            records: vec![([1280, 0, 0], StarClass(2), "Achenar")],
            fail: false,
        };
        let ctx = ctx(source, settings);
        let sector = fill_sector(Sector::new(key(), 100), &ctx);

        assert_eq!(sector.payload.count, 1, "excluded records are kept");
        assert!(sector.payload.positions[0].w < 0.0, "sentinel tag applied");
    }

    #[test]
    fn test_distance_annotation() {
        let mut settings = EngineSettings::default();
        settings.show_distance = true;
        // One record at the world origin; the cell centre is (50,50,50).
        let source = FakeSource {
            records: vec![([0, 0, 0], StarClass(0), "Sol")],
            fail: false,
        };
        let ctx = ctx(source, settings);
        let sector = fill_sector(Sector::new(key(), 100), &ctx);

        let expected = (3.0f32 * 50.0 * 50.0).sqrt();
        assert_eq!(sector.payload.labels[0], format!("Sol @ {expected:.1}ly"));
    }

    #[test]
    fn test_empty_result_is_loaded_not_failed() {
        let source = FakeSource {
            records: vec![],
            fail: false,
        };
        let ctx = ctx(source, EngineSettings::default());
        let sector = fill_sector(Sector::new(key(), 100), &ctx);

        assert_eq!(sector.state, SectorState::Loaded);
        assert_eq!(sector.payload.count, 0);
        assert!(!sector.load_failed);
        assert!(sector.payload.images.is_empty());
    }

    #[test]
    fn test_query_failure_degrades_to_empty_flagged_sector() {
        let source = FakeSource {
            records: vec![],
            fail: true,
        };
        let ctx = ctx(source, EngineSettings::default());
        let sector = fill_sector(Sector::new(key(), 100), &ctx);

        assert!(sector.load_failed);
        assert_eq!(sector.payload.count, 0);
        assert_eq!(ctx.stats.snapshot().load_failures, 1);
    }

    #[tokio::test]
    async fn test_in_flight_guard_decrements_once() {
        use tokio::sync::Semaphore;
        let in_flight = Arc::new(AtomicUsize::new(0));
        let semaphore = Arc::new(Semaphore::new(1));

        let permit = semaphore.clone().try_acquire_owned().unwrap();
        let guard = InFlightGuard::new(Arc::clone(&in_flight), permit);
        assert_eq!(in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(semaphore.available_permits(), 0);

        drop(guard);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(semaphore.available_permits(), 1);
    }
}
