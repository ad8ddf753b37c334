//! Render command - render one tile to a PNG file.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use mandeltiles::{TileError, TileIndex, TileScheduler};

use super::common::{channel_sink, ensure_dir, resolve_config, write_tile_png, SettingsArgs};
use crate::error::CliError;

/// Arguments for the render command.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Zoom level
    #[arg(long)]
    pub level: u8,

    /// Tile column (0 is just right of the root center)
    #[arg(long, allow_negative_numbers = true)]
    pub x: i64,

    /// Tile row (0 is just below the root center)
    #[arg(long, allow_negative_numbers = true)]
    pub y: i64,

    /// Output directory
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
}

/// Reject a tile the scheduler does not serve before mapping it.
fn check_served(scheduler: &TileScheduler, index: TileIndex) -> Result<(), CliError> {
    if scheduler.contains(&index) {
        return Ok(());
    }
    Err(CliError::Tile {
        index,
        error: TileError::OutOfRange {
            index,
            min: scheduler.min_level(),
            max: scheduler.max_level(),
        },
    })
}

/// Run the render command.
pub fn run(settings: &SettingsArgs, args: RenderArgs) -> Result<(), CliError> {
    let config = resolve_config(settings)?;
    let (sink, reports) = channel_sink();
    let scheduler = TileScheduler::new(config, sink)?;

    let index = TileIndex::new(args.level, args.x, args.y);
    check_served(&scheduler, index)?;
    let region = scheduler.region_for(&index);

    println!("{} tile {}", scheduler.server_name(), index);
    println!("  Region: {}", region);
    println!("  Size:   {} px", scheduler.tile_size());

    let started = Instant::now();
    scheduler.request_tile(index);
    let (index, result) = reports
        .recv()
        .map_err(|_| CliError::Config("scheduler stopped before reporting".to_string()))?;
    let pixels = result.map_err(|error| CliError::Tile { index, error })?;

    ensure_dir(&args.out)?;
    let path = write_tile_png(&args.out, &index, &pixels)?;
    println!(
        "Wrote {} in {:.1} ms",
        path.display(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}
