//! Engine configuration.
//!
//! Settings structs are pure data in [`settings`]; INI loading lives in
//! [`file`]. Defaults match the tuning the galaxy map ships with.

mod file;
mod settings;

pub use file::{load_from, ConfigError};
pub use settings::{EngineSettings, LabelSettings};
