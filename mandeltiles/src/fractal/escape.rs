//! Escape-time iteration for the Mandelbrot set.

/// Escape radius squared (`|z| > 2`).
pub const ESCAPE_RADIUS_SQ: f64 = 4.0;

/// Outcome of iterating a single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Escape {
    /// Iterations performed before escape, or the cap for interior points.
    pub iterations: u32,
    /// Whether `|z|` exceeded the escape radius before the cap.
    pub escaped: bool,
    /// `|z|²` at the last iteration.
    pub final_norm_sq: f64,
}

impl Escape {
    /// Continuous (normalized) iteration count for escaped points.
    ///
    /// Returns `None` for interior points. The value removes the banding of
    /// the integer count: `n + 1 - log2(ln|z|)`.
    pub fn smooth(&self) -> Option<f64> {
        if !self.escaped {
            return None;
        }
        let log_zn = self.final_norm_sq.ln() / 2.0;
        let nu = (log_zn / std::f64::consts::LN_2).log2();
        Some((self.iterations as f64 + 1.0 - nu).max(0.0))
    }
}

/// Iterates `z ← z² + c` from `z = 0` until `|z| > 2` or `max_iterations`.
///
/// # Example
///
/// ```
/// use mandeltiles::fractal::escape_time;
///
/// // The origin never escapes
/// let inside = escape_time(0.0, 0.0, 100);
/// assert!(!inside.escaped);
/// assert_eq!(inside.iterations, 100);
///
/// // Points far from the set escape immediately
/// let outside = escape_time(3.0, 3.0, 100);
/// assert!(outside.escaped);
/// ```
#[inline]
pub fn escape_time(c_re: f64, c_im: f64, max_iterations: u32) -> Escape {
    let mut zx = 0.0_f64;
    let mut zy = 0.0_f64;

    for i in 0..max_iterations {
        // z = z^2 + c
        let new_zx = zx * zx - zy * zy + c_re;
        let new_zy = 2.0 * zx * zy + c_im;
        zx = new_zx;
        zy = new_zy;

        let norm_sq = zx * zx + zy * zy;
        if norm_sq > ESCAPE_RADIUS_SQ {
            return Escape {
                iterations: i + 1,
                escaped: true,
                final_norm_sq: norm_sq,
            };
        }
    }

    Escape {
        iterations: max_iterations,
        escaped: false,
        final_norm_sq: zx * zx + zy * zy,
    }
}
