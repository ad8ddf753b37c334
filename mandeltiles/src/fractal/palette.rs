//! Iteration-count to color mapping.
//!
//! The renderer is palette-agnostic: anything implementing [`Palette`] can
//! color a tile, including plain closures.

use super::escape::Escape;
use image::Rgba;

/// Maps an escape-time result to a pixel color.
///
/// Implementations are called from worker threads and must be `Send + Sync`.
pub trait Palette: Send + Sync {
    /// Color for one pixel.
    fn color(&self, escape: &Escape, max_iterations: u32) -> Rgba<u8>;
}

impl<F> Palette for F
where
    F: Fn(&Escape, u32) -> Rgba<u8> + Send + Sync,
{
    fn color(&self, escape: &Escape, max_iterations: u32) -> Rgba<u8> {
        self(escape, max_iterations)
    }
}

/// Hue-saturation-brightness palette.
///
/// Hue follows the smooth iteration count; interior points are opaque
/// black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsbPalette {
    /// Hue degrees added per iteration.
    pub hue_step: f64,
    /// Hue offset in degrees.
    pub hue_offset: f64,
    pub saturation: f64,
    pub brightness: f64,
}

impl Default for HsbPalette {
    fn default() -> Self {
        Self {
            hue_step: 9.0,
            hue_offset: 200.0,
            saturation: 0.85,
            brightness: 1.0,
        }
    }
}

impl Palette for HsbPalette {
    fn color(&self, escape: &Escape, _max_iterations: u32) -> Rgba<u8> {
        match escape.smooth() {
            Some(smooth) => {
                let hue = (self.hue_offset + smooth * self.hue_step).rem_euclid(360.0);
                hsb_to_rgba(hue, self.saturation, self.brightness)
            }
            None => Rgba([0, 0, 0, 255]),
        }
    }
}

/// Converts HSB (hue in degrees, saturation and brightness in `0..=1`) to
/// an opaque RGBA color.
pub fn hsb_to_rgba(hue: f64, saturation: f64, brightness: f64) -> Rgba<u8> {
    let s = saturation.clamp(0.0, 1.0);
    let v = brightness.clamp(0.0, 1.0);
    let h = hue.rem_euclid(360.0) / 60.0;

    let c = v * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let to_byte = |channel: f64| ((channel + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba([to_byte(r), to_byte(g), to_byte(b), 255])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fractal::escape_time;

    #[test]
    fn test_hsb_primary_colors() {
        assert_eq!(hsb_to_rgba(0.0, 1.0, 1.0), Rgba([255, 0, 0, 255]));
        assert_eq!(hsb_to_rgba(120.0, 1.0, 1.0), Rgba([0, 255, 0, 255]));
        assert_eq!(hsb_to_rgba(240.0, 1.0, 1.0), Rgba([0, 0, 255, 255]));
        assert_eq!(hsb_to_rgba(360.0, 1.0, 1.0), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_hsb_greyscale() {
        assert_eq!(hsb_to_rgba(77.0, 0.0, 1.0), Rgba([255, 255, 255, 255]));
        assert_eq!(hsb_to_rgba(77.0, 0.0, 0.0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_interior_is_black() {
        let palette = HsbPalette::default();
        let inside = escape_time(0.0, 0.0, 64);
        assert_eq!(palette.color(&inside, 64), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_exterior_is_colored() {
        let palette = HsbPalette::default();
        let outside = escape_time(0.4, 0.4, 64);
        let color = palette.color(&outside, 64);
        assert_ne!(color, Rgba([0, 0, 0, 255]));
        assert_eq!(color.0[3], 255);
    }

    #[test]
    fn test_closure_is_a_palette() {
        let grey = |escape: &Escape, max: u32| {
            let v = (escape.iterations * 255 / max.max(1)) as u8;
            Rgba([v, v, v, 255])
        };
        let e = escape_time(0.0, 0.0, 10);
        assert_eq!(grey.color(&e, 10), Rgba([255, 255, 255, 255]));
    }
}
