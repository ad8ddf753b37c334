//! MandelTiles CLI - Command-line interface
//!
//! Drives the tile scheduler from the command line: render single tiles or
//! whole levels to PNG, or replay a pan burst to see the LIFO backlog at
//! work.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mandeltiles::logging::init_logging;

use commands::burst::BurstArgs;
use commands::common::SettingsArgs;
use commands::level::LevelArgs;
use commands::render::RenderArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "mandeltiles", version)]
#[command(about = "Render Mandelbrot map tiles on demand", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render one tile to a PNG file
    Render(RenderArgs),
    /// Render every tile of a zoom level
    Level(LevelArgs),
    /// Request a burst of tiles and report the render order
    Burst(BurstArgs),
}

fn main() {
    let cli = Cli::parse();

    let _logging_guard = match init_logging(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    let result = match cli.command {
        Commands::Render(args) => commands::render::run(&cli.settings, args),
        Commands::Level(args) => commands::level::run(&cli.settings, args),
        Commands::Burst(args) => commands::burst::run(&cli.settings, args),
    };

    if let Err(e) = result {
        e.exit();
    }
}
