//! INI loading for engine settings.
//!
//! Starts from [`EngineSettings::default`] and overlays any values found in
//! the file. The single place where INI key names map to struct fields.

use super::settings::EngineSettings;
use ini::Ini;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or parse the INI file.
    #[error("failed to read config file: {0}")]
    Read(#[from] ini::Error),

    /// A key held a value that does not parse or is out of range.
    #[error("invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Loads engine settings from `path`.
///
/// A missing file yields the defaults; a present but invalid file is an
/// error.
pub fn load_from(path: &Path) -> Result<EngineSettings, ConfigError> {
    if !path.exists() {
        return Ok(EngineSettings::default());
    }
    let ini = Ini::load_from_file(path)?;
    parse_ini(&ini)
}

fn parse_ini(ini: &Ini) -> Result<EngineSettings, ConfigError> {
    let mut settings = EngineSettings::default();

    if let Some(section) = ini.section(Some("engine")) {
        if let Some(v) = section.get("cell_size") {
            settings.cell_size = parse_positive(v, "engine", "cell_size")?;
        }
        if let Some(v) = section.get("max_workers") {
            settings.max_workers = parse_positive(v, "engine", "max_workers")?;
        }
        if let Some(v) = section.get("max_pending") {
            settings.max_pending = parse_positive(v, "engine", "max_pending")?;
        }
        if let Some(v) = section.get("object_ceiling") {
            settings.object_ceiling = parse_positive(v, "engine", "object_ceiling")?;
        }
        if let Some(v) = section.get("eviction_margin") {
            settings.eviction_margin = parse_positive(v, "engine", "eviction_margin")?;
        }
        if let Some(v) = section.get("merge_burst") {
            settings.merge_burst = parse_positive(v, "engine", "merge_burst")?;
        }
        if let Some(v) = section.get("merge_interval_ms") {
            settings.merge_interval =
                Duration::from_millis(parse_positive(v, "engine", "merge_interval_ms")?);
        }
        if let Some(v) = section.get("cleanup_interval_ms") {
            settings.cleanup_interval =
                Duration::from_millis(parse_positive(v, "engine", "cleanup_interval_ms")?);
        }
        if let Some(v) = section.get("show_distance") {
            settings.show_distance = parse_bool(v, "engine", "show_distance")?;
        }
        if settings.eviction_margin >= settings.object_ceiling {
            return Err(ConfigError::InvalidValue {
                section: "engine".to_string(),
                key: "eviction_margin".to_string(),
                value: settings.eviction_margin.to_string(),
                reason: "must be smaller than object_ceiling".to_string(),
            });
        }
    }

    if let Some(section) = ini.section(Some("labels")) {
        if let Some(v) = section.get("bitmap_width") {
            settings.labels.bitmap_width = parse_positive(v, "labels", "bitmap_width")?;
        }
        if let Some(v) = section.get("bitmap_height") {
            settings.labels.bitmap_height = parse_positive(v, "labels", "bitmap_height")?;
        }
    }

    Ok(settings)
}

fn parse_positive<T>(value: &str, section: &str, key: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    value.parse().map_err(|_| ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: "must be a positive integer".to_string(),
    })
}

fn parse_bool(value: &str, section: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a boolean (true/false)".to_string(),
        }),
    }
}
