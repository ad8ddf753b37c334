//! MandelTiles - on-demand Mandelbrot tiles for pannable map views
//!
//! A map viewport asks for tiles by `(level, x, y)`; this library maps each
//! index to a region of the complex plane, renders it on a bounded pool of
//! worker threads and reports the pixels back through a callback.
//!
//! When the viewer pans faster than tiles render, the most recent requests
//! win: waiting requests sit on a LIFO backlog and each finished tile pulls
//! the newest one next.
//!
//! # Modules
//!
//! - [`coord`] - tile index to plane region mapping
//! - [`fractal`] - escape-time rendering and palettes
//! - [`executor`] - bounded-concurrency worker pool
//! - [`scheduler`] - request admission, LIFO backlog and drain chains
//! - [`config`] - server configuration
//! - [`logging`] - subscriber setup for binaries

pub mod config;
pub mod coord;
pub mod executor;
pub mod fractal;
pub mod logging;
pub mod scheduler;

pub use config::{ConfigError, TileServerConfig};
pub use coord::{PlaneMapper, PlaneRegion, TileIndex};
pub use fractal::{FractalRenderer, HsbPalette, Palette, RenderError, TilePixels};
pub use scheduler::{SchedulerError, SchedulerStats, TileError, TileScheduler, TileSink};
