//! CLI error handling with user-friendly messages.
//!
//! Centralizes error reporting for the CLI so every command exits the same
//! way: a message on stderr and exit code 1.

use std::fmt;
use std::path::PathBuf;
use std::process;

use mandeltiles::{ConfigError, SchedulerError, TileError, TileIndex};

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Invalid command-line settings
    Config(String),
    /// Failed to load or validate the config file
    ConfigFile(ConfigError),
    /// Failed to create the scheduler
    Scheduler(SchedulerError),
    /// A requested tile could not be rendered
    Tile { index: TileIndex, error: TileError },
    /// Failed to write a PNG
    FileWrite {
        path: PathBuf,
        error: image::ImageError,
    },
    /// Failed to create an output directory
    CreateDir { path: PathBuf, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an error message.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Tile {
            error: TileError::OutOfRange { .. },
            ..
        } = self
        {
            eprintln!();
            eprintln!("Use --config to serve a different level range.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Scheduler(e) => write!(f, "Failed to start tile scheduler: {}", e),
            CliError::Tile { index, error } => write!(f, "Tile {} failed: {}", index, error),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write '{}': {}", path.display(), error)
            }
            CliError::CreateDir { path, error } => {
                write!(f, "Failed to create '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Scheduler(e) => Some(e),
            CliError::Tile { error, .. } => Some(error),
            CliError::FileWrite { error, .. } => Some(error),
            CliError::CreateDir { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<SchedulerError> for CliError {
    fn from(e: SchedulerError) -> Self {
        CliError::Scheduler(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_tile_error_display() {
        let err = CliError::Tile {
            index: TileIndex::new(3, 1, -2),
            error: TileError::Panicked("boom".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("L3/1/-2"));
        assert!(msg.contains("boom"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: CliError = ConfigError::Invalid("tile_size must be > 0".into()).into();
        assert!(matches!(err, CliError::ConfigFile(_)));
        assert!(err.to_string().contains("tile_size"));
    }

    #[test]
    fn test_plain_config_error_has_no_source() {
        let err = CliError::Config("level too deep".into());
        assert_eq!(err.to_string(), "Configuration error: level too deep");
        assert!(err.source().is_none());
    }
}
