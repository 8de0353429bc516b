//! Star streaming engine facade.
//!
//! This module provides the central type that wires the pipeline together
//! and manages its lifecycle. The engine owns the foreground state (the
//! residency set and the request planner) and runs the dispatcher as a
//! background task.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         StarStream                           │
//! │                                                              │
//! │  planner ──► request queue ──► dispatcher ──► workers        │
//! │                                  (task)       (pool)         │
//! │                                                 │            │
//! │  residency ◄── ingestor ◄── completed channel ◄─┘            │
//! │      │                                                       │
//! │      └──► cleanup queue (bitmap disposal, off the hot path)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! 1. **Creation**: `new()` spawns the dispatcher task immediately; it
//!    requires a running tokio runtime.
//! 2. **Operation**: the embedding view calls the request methods as the
//!    viewpoint moves and [`StarStream::update`] once per frame.
//! 3. **Shutdown**: `shutdown()` cancels the dispatcher, waits for every
//!    in-flight loader, and drains the cleanup queue.

use crate::cleanup::CleanupQueue;
use crate::config::EngineSettings;
use crate::coord::SectorKey;
use crate::dispatcher::Dispatcher;
use crate::ingestor::ResultIngestor;
use crate::label::LabelRasterizer;
use crate::planner::RequestPlanner;
use crate::queue::RequestQueue;
use crate::residency::{ResidencySet, ResidentSector};
use crate::sector::Sector;
use crate::source::StarSource;
use crate::stats::{StreamStats, StreamStatsSnapshot};
use crate::worker::LoadContext;
use glam::{Mat4, Vec3};
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Full rotation period of the idle view animation.
const ROTATION_PERIOD: Duration = Duration::from_secs(10);
/// Eye distance at which the animation scale starts growing past 1.
const SCALE_DISTANCE: f32 = 5000.0;
/// Upper bound of the animation scale.
const MAX_SCALE: f32 = 4.0;

/// Per-frame view animation produced by [`StarStream::update`].
///
/// The model matrix spins the whole field about the vertical axis once per
/// [`ROTATION_PERIOD`] and grows it with eye distance, so a zoomed-out view
/// still shows individually resolvable stars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Combined rotation and scale, ready to multiply into the view.
    pub model: Mat4,
    /// Current rotation angle in radians.
    pub angle: f32,
    /// Uniform scale derived from the eye distance, in `[1, 4]`.
    pub scale: f32,
}

/// The star streaming engine.
///
/// Owns the foreground state and the background dispatcher. All methods
/// must be called from the same thread; the residency set is deliberately
/// unsynchronized.
pub struct StarStream {
    settings: Arc<EngineSettings>,
    stats: Arc<StreamStats>,
    residency: ResidencySet,
    planner: RequestPlanner,
    queue: RequestQueue,
    ingestor: ResultIngestor,
    completed_rx: mpsc::UnboundedReceiver<Sector>,
    cleanup: Arc<CleanupQueue>,
    workers: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    shutdown_token: CancellationToken,
    dispatcher_handle: Option<JoinHandle<()>>,
    started: Instant,
}

impl StarStream {
    /// Creates the engine and starts its dispatcher task.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        settings: EngineSettings,
        source: Arc<dyn StarSource>,
        rasterizer: Arc<dyn LabelRasterizer>,
    ) -> Self {
        let settings = Arc::new(settings);
        let stats = Arc::new(StreamStats::default());
        let cleanup = Arc::new(CleanupQueue::new());
        let workers = Arc::new(Semaphore::new(settings.max_workers));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let (queue, request_rx) = RequestQueue::new(Arc::clone(&stats));
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();

        let ctx = Arc::new(LoadContext {
            source,
            rasterizer,
            settings: Arc::clone(&settings),
            stats: Arc::clone(&stats),
        });
        let dispatcher = Dispatcher::new(
            request_rx,
            completed_tx,
            Arc::clone(&cleanup),
            Arc::clone(&workers),
            Arc::clone(&in_flight),
            queue.pending_counter(),
            ctx,
        );

        let shutdown_token = CancellationToken::new();
        let dispatcher_shutdown = shutdown_token.clone();
        let dispatcher_handle = Some(tokio::spawn(async move {
            dispatcher.run(dispatcher_shutdown).await;
        }));
        info!(
            cell_size = settings.cell_size,
            workers = settings.max_workers,
            ceiling = settings.object_ceiling,
            "star stream started"
        );

        Self {
            planner: RequestPlanner::new(settings.cell_size, settings.max_pending),
            ingestor: ResultIngestor::new(Arc::clone(&settings)),
            settings,
            stats,
            residency: ResidencySet::new(),
            queue,
            completed_rx,
            cleanup,
            workers,
            in_flight,
            shutdown_token,
            dispatcher_handle,
            started: Instant::now(),
        }
    }

    // ========================================================================
    // Request surface
    // ========================================================================

    /// Requests one cube of the given edge length centred on `pos`.
    pub fn request_box_around(&mut self, pos: Vec3, size: i32) {
        self.planner
            .request_box_around(&mut self.residency, &self.queue, pos, size);
    }

    /// Removes the cube previously requested via
    /// [`request_box_around`](Self::request_box_around).
    pub fn clear_box_around(&mut self) {
        self.planner.clear_box_around(&mut self.residency);
    }

    /// Requests the 27-cell neighborhood of `pos` unconditionally.
    pub fn request_nine_box(&mut self, pos: Vec3) {
        self.planner
            .request_nine_box(&mut self.residency, &self.queue, pos);
    }

    /// Requests the 27-cell neighborhood of `pos` if the viewpoint moved at
    /// least one cell and the queue is not backed up. Returns whether a
    /// request was issued.
    pub fn request_box_conditional(&mut self, pos: Vec3) -> bool {
        self.planner
            .request_box_conditional(&mut self.residency, &self.queue, pos)
    }

    /// Removes one sector immediately, reservation or resident.
    ///
    /// Removal is synchronous so a re-request issued right after always
    /// starts a fresh lifecycle for the key. A load still in flight either
    /// lands as a stale result and is dropped, or is adopted by the fresh
    /// reservation when the same cell was re-requested meanwhile.
    pub fn clear_sector(&mut self, key: SectorKey) {
        self.residency.remove(&key);
    }

    /// Drops every resident sector and reservation immediately.
    ///
    /// In-flight loads become stale and are dropped when they land.
    pub fn clear_all(&mut self) {
        info!(
            residents = self.residency.resident_count(),
            "clearing all sectors"
        );
        self.residency.clear();
        self.planner.reset();
    }

    // ========================================================================
    // Foreground tick
    // ========================================================================

    /// Per-frame update: merges completed sectors into the residency set
    /// and returns the current view animation for `eye_distance`.
    pub fn update(&mut self, eye_distance: f32) -> ViewTransform {
        self.ingestor.tick(
            &mut self.residency,
            &mut self.completed_rx,
            &self.cleanup,
            &self.stats,
        );

        let elapsed = self.started.elapsed().as_secs_f32();
        let angle = TAU * (elapsed / ROTATION_PERIOD.as_secs_f32()).fract();
        let scale = (eye_distance / SCALE_DISTANCE).clamp(1.0, MAX_SCALE);
        ViewTransform {
            model: Mat4::from_rotation_y(-angle) * Mat4::from_scale(Vec3::splat(scale)),
            angle,
            scale,
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Resident sector for a key, if merged.
    pub fn get(&self, key: &SectorKey) -> Option<&ResidentSector> {
        self.residency.get(key)
    }

    /// Iterates resident sectors in merge order, oldest first.
    pub fn residents(&self) -> impl Iterator<Item = (&SectorKey, &ResidentSector)> {
        self.residency.residents()
    }

    /// Total renderable records across resident sectors.
    pub fn object_count(&self) -> usize {
        self.residency.object_count()
    }

    /// Number of resident sectors.
    pub fn resident_count(&self) -> usize {
        self.residency.resident_count()
    }

    /// Whether any request is queued or being loaded.
    pub fn is_loading(&self) -> bool {
        self.queue.pending() > 0 || self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Viewpoint of the last issued request.
    pub fn current_pos(&self) -> Vec3 {
        self.planner.current_pos()
    }

    /// Point-in-time pipeline counters.
    pub fn stats(&self) -> StreamStatsSnapshot {
        self.stats.snapshot()
    }

    /// Engine settings in effect.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Shuts the engine down gracefully.
    ///
    /// Cancels the dispatcher, waits for every in-flight loader to finish
    /// by reclaiming the whole worker pool, then disposes any bitmaps still
    /// parked on the cleanup queue.
    pub async fn shutdown(mut self) {
        info!("shutting down star stream");
        self.shutdown_token.cancel();

        if let Some(handle) = self.dispatcher_handle.take() {
            match handle.await {
                Ok(()) => info!("sector dispatcher shut down cleanly"),
                Err(e) => error!("sector dispatcher task panicked: {e}"),
            }
        }

        // Loaders hold permits until they finish; owning the full pool
        // means none are left.
        let workers = self.settings.max_workers as u32;
        let _permits = self.workers.acquire_many(workers).await;

        let disposed = self.cleanup.drain(&self.stats);
        info!(disposed, "star stream stopped");
    }
}
