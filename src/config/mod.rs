//! Global configuration.
//!
//! Read from `config.json` in the state root. Every knob has a default and
//! unknown fields are ignored, so a missing or stale file never blocks a
//! read.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hard cap per response body, in MiB.
    pub max_feed_size_mb: f64,
    /// Interval gate granularity in days; 0 means always fetch.
    pub fetch_interval_days: u32,
    /// Hour (0-23) at which the logical day rolls over.
    pub day_start_hour: u8,
    /// Horizon for history files and the seen store, in days.
    pub retention_days: u32,
    /// Per-feed item cap; 0 means unlimited.
    pub max_items_per_feed: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_feed_size_mb: 0.2,
            fetch_interval_days: 1,
            day_start_hour: 0,
            retention_days: 50,
            max_items_per_feed: 20,
        }
    }
}

impl Config {
    /// Loads the config, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load(path: &Path) -> Self {
        let mut config = match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(config) => config,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "unparsable config, using defaults");
                    Config::default()
                }
            },
            Err(err) => {
                debug!(path = %path.display(), error = %err, "no config file, using defaults");
                Config::default()
            }
        };
        config.day_start_hour = config.day_start_hour.min(23);
        config
    }

    pub fn max_body_bytes(&self) -> usize {
        (self.max_feed_size_mb * 1024.0 * 1024.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fetch_interval_days, 1);
        assert_eq!(config.retention_days, 50);
        assert_eq!(config.max_items_per_feed, 20);
        assert_eq!(config.max_body_bytes(), 209_715);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json"));
        assert_eq!(config.fetch_interval_days, 1);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"fetch_interval_days": 3, "unknown_knob": true}"#).unwrap();
        let config = Config::load(&path);
        assert_eq!(config.fetch_interval_days, 3);
        assert_eq!(config.retention_days, 50);
    }

    #[test]
    fn test_day_start_hour_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"day_start_hour": 99}"#).unwrap();
        assert_eq!(Config::load(&path).day_start_hour, 23);
    }
}
