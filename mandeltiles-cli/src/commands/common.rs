//! Common types and utilities shared across CLI commands.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

use clap::Args;
use image::ImageFormat;
use mandeltiles::{TileError, TileIndex, TilePixels, TileServerConfig, TileSink};

use crate::error::CliError;

/// Scheduler settings shared by every command.
///
/// Flags override values loaded from `--config`.
#[derive(Debug, Clone, Default, Args)]
pub struct SettingsArgs {
    /// JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum concurrently running renders (default: CPU count x 10)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Maximum concurrent drain chains
    #[arg(long, global = true)]
    pub chains: Option<usize>,

    /// Tile size in pixels
    #[arg(long, global = true)]
    pub tile_size: Option<u32>,

    /// Escape-time iteration cap
    #[arg(long, global = true)]
    pub iterations: Option<u32>,
}

/// A tile report as delivered by the scheduler.
pub type TileReport = (TileIndex, Result<TilePixels, TileError>);

/// Resolve the scheduler config from the file and CLI flags.
pub fn resolve_config(settings: &SettingsArgs) -> Result<TileServerConfig, CliError> {
    let mut config = match &settings.config {
        Some(path) => TileServerConfig::from_json_file(path)?,
        None => TileServerConfig::default(),
    };

    // CLI takes precedence over the file
    if let Some(workers) = settings.workers {
        config = config.with_workers(workers);
    }
    if let Some(chains) = settings.chains {
        config = config.with_max_chains(chains);
    }
    if let Some(tile_size) = settings.tile_size {
        config = config.with_tile_size(tile_size);
    }
    if let Some(iterations) = settings.iterations {
        config = config.with_max_iterations(iterations);
    }

    config.validate()?;
    Ok(config)
}

/// Sink that forwards every report to a channel.
pub fn channel_sink() -> (impl TileSink, Receiver<TileReport>) {
    let (tx, rx) = mpsc::channel();
    let sink = move |index: TileIndex, result: Result<TilePixels, TileError>| {
        // The receiver is gone once the command has what it needs
        let _ = tx.send((index, result));
    };
    (sink, rx)
}

/// File name for a tile: `L{level}_{x}_{y}.png`.
pub fn tile_file_name(index: &TileIndex) -> String {
    format!("L{}_{}_{}.png", index.level, index.x, index.y)
}

/// Create `dir` if it does not exist.
pub fn ensure_dir(dir: &Path) -> Result<(), CliError> {
    fs::create_dir_all(dir).map_err(|error| CliError::CreateDir {
        path: dir.to_path_buf(),
        error,
    })
}

/// Write a tile as PNG into `dir`, returning the file path.
pub fn write_tile_png(
    dir: &Path,
    index: &TileIndex,
    pixels: &TilePixels,
) -> Result<PathBuf, CliError> {
    let path = dir.join(tile_file_name(index));
    pixels
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|error| CliError::FileWrite {
            path: path.clone(),
            error,
        })?;
    Ok(path)
}
