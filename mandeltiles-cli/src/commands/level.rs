//! Level command - render every tile of a zoom level.
//!
//! All tiles are requested at once, as a viewport does on a fresh zoom, and
//! each PNG is written as soon as its tile is reported.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use mandeltiles::coord::PlaneMapper;
use mandeltiles::TileScheduler;
use tracing::warn;

use super::common::{channel_sink, ensure_dir, resolve_config, write_tile_png, SettingsArgs};
use crate::error::CliError;

/// Deepest level the command renders in full (4^10 tiles).
pub const MAX_FULL_LEVEL: u8 = 10;

/// Arguments for the level command.
#[derive(Debug, Args)]
pub struct LevelArgs {
    /// Zoom level
    #[arg(long)]
    pub level: u8,

    /// Output directory
    #[arg(long, default_value = "tiles")]
    pub out: PathBuf,
}

/// Run the level command.
pub fn run(settings: &SettingsArgs, args: LevelArgs) -> Result<(), CliError> {
    if args.level > MAX_FULL_LEVEL {
        return Err(CliError::Config(format!(
            "level {} has too many tiles to render in full (max {})",
            args.level, MAX_FULL_LEVEL
        )));
    }

    let config = resolve_config(settings)?;
    let (sink, reports) = channel_sink();
    let scheduler = TileScheduler::new(config, sink)?;
    ensure_dir(&args.out)?;

    let tiles: Vec<_> = PlaneMapper::tiles_covering_root(args.level).collect();
    let total = tiles.len();
    println!(
        "Rendering {} tiles at level {} into {}",
        total,
        args.level,
        args.out.display()
    );

    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} tiles [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let started = Instant::now();
    for index in tiles {
        scheduler.request_tile(index);
    }

    let mut written = 0usize;
    let mut failed = Vec::new();
    for _ in 0..total {
        let Ok((index, result)) = reports.recv() else {
            break;
        };
        match result {
            Ok(pixels) => {
                write_tile_png(&args.out, &index, &pixels)?;
                written += 1;
            }
            Err(error) => {
                warn!(tile = %index, error = %error, "Tile failed");
                failed.push(CliError::Tile { index, error });
            }
        }
        progress.inc(1);
    }
    progress.finish_with_message("done");

    let stats = scheduler.stats();
    println!();
    println!("Level {} complete in {:.2?}", args.level, started.elapsed());
    println!("  Written:    {}", written);
    println!("  Failed:     {}", failed.len());
    println!("  Direct:     {}", stats.direct);
    println!("  Backlogged: {}", stats.backlogged);

    match failed.into_iter().next() {
        Some(first) => Err(first),
        None => Ok(()),
    }
}
