//! StarStream - streaming star-sector cache for a 3D galaxy map
//!
//! This library streams spatially-indexed star records around a moving
//! viewpoint. Sectors (cubic grid cells) are requested by the foreground,
//! loaded asynchronously from a slow data source by a bounded worker pool,
//! and merged into a capacity-bounded residency set that the renderer reads.
//!
//! # High-Level API
//!
//! ```ignore
//! use starstream::engine::StarStream;
//! use starstream::config::EngineSettings;
//!
//! let mut stream = StarStream::new(EngineSettings::default(), source, rasterizer);
//!
//! // Per camera tick on the foreground thread:
//! stream.request_box_conditional(camera_pos);
//! let anim = stream.update(eye_distance);
//!
//! // On teardown:
//! stream.shutdown().await;
//! ```

pub mod cleanup;
pub mod config;
pub mod coord;
mod dispatcher;
pub mod engine;
mod ingestor;
pub mod label;
pub mod logging;
pub mod placement;
pub mod planner;
pub mod queue;
pub mod residency;
pub mod sector;
pub mod source;
pub mod stats;
mod worker;

/// Version of the starstream library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
