//! Tile renderer: plane region in, immutable pixel buffer out.

use std::ops::Deref;
use std::sync::Arc;

use image::RgbaImage;

use super::escape::escape_time;
use super::palette::Palette;
use super::RenderError;
use crate::coord::PlaneRegion;

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: u32 = 256;

/// Rendered tile pixels.
///
/// Shared and read-only once produced; cloning is cheap.
#[derive(Debug, Clone)]
pub struct TilePixels(Arc<RgbaImage>);

impl TilePixels {
    /// Side length in pixels.
    pub fn resolution(&self) -> u32 {
        self.0.width()
    }

    /// Raw RGBA bytes, row-major from the top-left pixel.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_raw()
    }
}

impl Deref for TilePixels {
    type Target = RgbaImage;

    fn deref(&self) -> &RgbaImage {
        &self.0
    }
}

/// Escape-time renderer for square tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FractalRenderer {
    resolution: u32,
    max_iterations: u32,
}

impl FractalRenderer {
    pub fn new(resolution: u32, max_iterations: u32) -> Self {
        Self {
            resolution,
            max_iterations,
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Renders `region` into a `resolution × resolution` image.
    ///
    /// Pixel `(px, py)` samples the center of its cell. Row 0 is the top of
    /// the region (`ymax`), matching image-row order.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidResolution`] if the resolution is zero
    /// - [`RenderError::DegenerateRegion`] if the region is not finite or
    ///   has a non-positive extent
    /// - [`RenderError::PrecisionExhausted`] if neighbouring pixels would
    ///   collapse onto the same `f64` coordinate (zoomed past double
    ///   precision)
    pub fn render(
        &self,
        region: &PlaneRegion,
        palette: &dyn Palette,
    ) -> Result<TilePixels, RenderError> {
        if self.resolution == 0 {
            return Err(RenderError::InvalidResolution(self.resolution));
        }
        if !region.is_well_formed() {
            return Err(RenderError::DegenerateRegion(*region));
        }

        let n = self.resolution as f64;
        let dx = region.width / n;
        let dy = region.height / n;
        check_precision(region.xmin, region.xmax(), dx, region)?;
        check_precision(region.ymin, region.ymax(), dy, region)?;

        let ymax = region.ymax();
        let mut image = RgbaImage::new(self.resolution, self.resolution);
        for (px, py, pixel) in image.enumerate_pixels_mut() {
            let c_re = region.xmin + (px as f64 + 0.5) * dx;
            let c_im = ymax - (py as f64 + 0.5) * dy;
            let escape = escape_time(c_re, c_im, self.max_iterations);
            *pixel = palette.color(&escape, self.max_iterations);
        }

        Ok(TilePixels(Arc::new(image)))
    }
}

impl Default for FractalRenderer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TILE_SIZE, DEFAULT_MAX_ITERATIONS)
    }
}

/// Fails when a pixel step no longer moves the coordinate at either end of
/// the axis.
fn check_precision(min: f64, max: f64, step: f64, region: &PlaneRegion) -> Result<(), RenderError> {
    let resolvable = |v: f64| v + step != v;
    if step > 0.0 && resolvable(min) && resolvable(max) {
        Ok(())
    } else {
        Err(RenderError::PrecisionExhausted {
            region: *region,
            step,
        })
    }
}
