//! Mandelbrot tile rendering.
//!
//! Pure, CPU-bound functions with no shared state: [`escape_time`] for a
//! single point, [`FractalRenderer`] for a whole tile, and the [`Palette`]
//! seam that turns iteration counts into colors.

mod escape;
mod palette;
mod renderer;

pub use escape::{escape_time, Escape, ESCAPE_RADIUS_SQ};
pub use palette::{hsb_to_rgba, HsbPalette, Palette};
pub use renderer::{FractalRenderer, TilePixels, DEFAULT_MAX_ITERATIONS};

use thiserror::Error;

use crate::coord::PlaneRegion;

/// Errors from rendering a tile.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("Invalid tile resolution: {0}")]
    InvalidResolution(u32),

    #[error("Degenerate plane region {0}")]
    DegenerateRegion(PlaneRegion),

    #[error("Pixel step {step:e} is below f64 precision for region {region}")]
    PrecisionExhausted { region: PlaneRegion, step: f64 },
}
