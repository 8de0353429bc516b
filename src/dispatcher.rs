//! Background dispatch loop feeding sector loaders.
//!
//! Single consumer of the request channel. For each taken sector it first
//! acquires a worker permit, so the number of loaders in flight never
//! exceeds the configured pool size and the queue itself provides the
//! backlog. Shutdown is cooperative: the loop exits on cancellation without
//! taking further requests, while already-spawned loaders run to completion
//! and are awaited by the engine through the permit pool.

use crate::cleanup::CleanupQueue;
use crate::sector::Sector;
use crate::worker::{spawn_loader, InFlightGuard, LoadContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub(crate) struct Dispatcher {
    request_rx: mpsc::UnboundedReceiver<Sector>,
    completed_tx: mpsc::UnboundedSender<Sector>,
    cleanup: Arc<CleanupQueue>,
    workers: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    pending: Arc<AtomicUsize>,
    ctx: Arc<LoadContext>,
}

impl Dispatcher {
    pub fn new(
        request_rx: mpsc::UnboundedReceiver<Sector>,
        completed_tx: mpsc::UnboundedSender<Sector>,
        cleanup: Arc<CleanupQueue>,
        workers: Arc<Semaphore>,
        in_flight: Arc<AtomicUsize>,
        pending: Arc<AtomicUsize>,
        ctx: Arc<LoadContext>,
    ) -> Self {
        Self {
            request_rx,
            completed_tx,
            cleanup,
            workers,
            in_flight,
            pending,
            ctx,
        }
    }

    /// Runs until cancelled or the request channel closes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            workers = self.workers.available_permits(),
            "sector dispatcher started"
        );
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("sector dispatcher cancelled");
                    break;
                }
                taken = self.request_rx.recv() => {
                    match taken {
                        Some(sector) => {
                            if !self.dispatch(sector, &shutdown).await {
                                break;
                            }
                        }
                        None => {
                            debug!("request channel closed");
                            break;
                        }
                    }
                }
            }
        }
        info!("sector dispatcher stopped");
    }

    /// Acquires a worker slot and spawns the loader for one sector.
    ///
    /// Returns `false` when the loop should exit (cancelled while waiting
    /// for a slot, or the permit pool was closed).
    async fn dispatch(&self, sector: Sector, shutdown: &CancellationToken) -> bool {
        // Opportunistic bitmap disposal while the loop is awake anyway.
        self.cleanup.drain(&self.ctx.stats);

        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return false,
            acquired = Arc::clone(&self.workers).acquire_owned() => {
                match acquired {
                    Ok(permit) => permit,
                    Err(_) => return false,
                }
            }
        };

        // Committed: hand the slot to the loader before the request stops
        // counting as pending, so is_loading never blips false mid-handoff.
        let guard = InFlightGuard::new(Arc::clone(&self.in_flight), permit);
        self.pending.fetch_sub(1, Ordering::SeqCst);
        spawn_loader(
            sector,
            Arc::clone(&self.ctx),
            self.completed_tx.clone(),
            guard,
        );
        true
    }
}
