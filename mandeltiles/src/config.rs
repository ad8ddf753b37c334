//! Tile server configuration.
//!
//! All settings are fixed when the scheduler is built. Values can come from
//! code (builder methods) or from a JSON file; missing fields take their
//! defaults.
//!
//! ```json
//! {
//!   "tile_size": 256,
//!   "max_iterations": 512,
//!   "workers": 16,
//!   "max_chains": 4
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::{
    default_root, PlaneRegion, DEFAULT_MAX_LEVEL, DEFAULT_MIN_LEVEL, MAX_SUPPORTED_LEVEL,
};
use crate::executor::default_worker_count;
use crate::fractal::DEFAULT_MAX_ITERATIONS;

/// Default square tile size in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 128;

/// Default number of concurrent drain chains.
///
/// One chain means exactly one direct submission per idle period; every
/// other request goes through the LIFO backlog.
pub const DEFAULT_MAX_CHAINS: usize = 1;

/// Default server name.
pub const DEFAULT_SERVER_NAME: &str = "Mandelbrot";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tile server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileServerConfig {
    /// Tile side length in pixels.
    pub tile_size: u32,

    /// Escape-time iteration cap.
    pub max_iterations: u32,

    /// Plane region covered by the level-0 grid.
    pub root: PlaneRegion,

    /// Shallowest served zoom level.
    pub min_level: u8,

    /// Deepest served zoom level.
    pub max_level: u8,

    /// Executor worker ceiling; `None` derives it from the CPU count.
    pub workers: Option<usize>,

    /// Maximum concurrent drain chains.
    pub max_chains: usize,

    /// Name reported to the viewport.
    pub server_name: String,
}

impl Default for TileServerConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            root: default_root(),
            min_level: DEFAULT_MIN_LEVEL,
            max_level: DEFAULT_MAX_LEVEL,
            workers: None,
            max_chains: DEFAULT_MAX_CHAINS,
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

impl TileServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parses a config from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_root(mut self, root: PlaneRegion) -> Self {
        self.root = root;
        self
    }

    pub fn with_levels(mut self, min_level: u8, max_level: u8) -> Self {
        self.min_level = min_level;
        self.max_level = max_level;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_max_chains(mut self, max_chains: usize) -> Self {
        self.max_chains = max_chains;
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Effective executor worker ceiling.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(default_worker_count)
    }

    /// Checks that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::Invalid("tile_size must be > 0".into()));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid("max_iterations must be > 0".into()));
        }
        if self.min_level > self.max_level {
            return Err(ConfigError::Invalid(format!(
                "min_level {} is greater than max_level {}",
                self.min_level, self.max_level
            )));
        }
        if self.max_level > MAX_SUPPORTED_LEVEL {
            return Err(ConfigError::Invalid(format!(
                "max_level {} exceeds {}",
                self.max_level, MAX_SUPPORTED_LEVEL
            )));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be > 0".into()));
        }
        if self.max_chains == 0 {
            return Err(ConfigError::Invalid("max_chains must be > 0".into()));
        }
        if !self.root.is_well_formed() {
            return Err(ConfigError::Invalid(format!(
                "root region {} must be finite with positive extent",
                self.root
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TileServerConfig::default();
        assert_eq!(config.tile_size, 128);
        assert_eq!(config.min_level, 0);
        assert_eq!(config.max_level, 31);
        assert_eq!(config.max_chains, 1);
        assert_eq!(config.server_name, "Mandelbrot");
        assert!(config.workers.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_worker_count_falls_back_to_cpu_default() {
        assert_eq!(TileServerConfig::default().worker_count(), default_worker_count());
        assert_eq!(TileServerConfig::default().with_workers(7).worker_count(), 7);
    }

    #[test]
    fn test_builder_methods() {
        let config = TileServerConfig::new()
            .with_tile_size(64)
            .with_max_iterations(1000)
            .with_levels(2, 20)
            .with_workers(12)
            .with_max_chains(3)
            .with_server_name("Test");
        assert_eq!(config.tile_size, 64);
        assert_eq!(config.max_iterations, 1000);
        assert_eq!((config.min_level, config.max_level), (2, 20));
        assert_eq!(config.workers, Some(12));
        assert_eq!(config.max_chains, 3);
        assert_eq!(config.server_name, "Test");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            TileServerConfig::default().with_tile_size(0),
            TileServerConfig::default().with_max_iterations(0),
            TileServerConfig::default().with_levels(5, 4),
            TileServerConfig::default().with_levels(0, 63),
            TileServerConfig::default().with_workers(0),
            TileServerConfig::default().with_max_chains(0),
            TileServerConfig::default().with_root(PlaneRegion::new(0.0, 0.0, -1.0, 1.0)),
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{:?} should be invalid",
                config
            );
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TileServerConfig::from_json_str(r#"{ "tile_size": 256, "max_chains": 4 }"#)
            .unwrap();
        assert_eq!(config.tile_size, 256);
        assert_eq!(config.max_chains, 4);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.root, default_root());
    }

    #[test]
    fn test_json_root_region() {
        let config = TileServerConfig::from_json_str(
            r#"{ "root": { "xmin": -2.0, "ymin": -1.5, "width": 3.0, "height": 3.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.root, PlaneRegion::new(-2.0, -1.5, 3.0, 3.0));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = TileServerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "workers": 3, "server_name": "FromFile" }}"#).unwrap();

        let config = TileServerConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.server_name, "FromFile");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = TileServerConfig::from_json_file("/nonexistent/mandeltiles.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_json_roundtrip_preserves_config() {
        let config = TileServerConfig::default().with_workers(9).with_tile_size(32);
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(TileServerConfig::from_json_str(&text).unwrap(), config);
    }
}
