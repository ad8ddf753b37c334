//! Tile index and complex-plane region types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deepest zoom level whose side tile count still fits in an `i64`.
pub const MAX_SUPPORTED_LEVEL: u8 = 62;

/// Relative width below which an intersection counts as shared edge.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Position of a tile in the quad-tree grid at a given zoom level.
///
/// At level `L` the grid is `2^L` tiles on a side. `y` follows image-row
/// convention: increasing `y` moves down the map.
///
/// The scheduler treats an index purely as a correlation token; it never
/// compares indices for equality or deduplication.
///
/// # Example
///
/// ```
/// use mandeltiles::coord::TileIndex;
///
/// let index = TileIndex::new(3, 5, 2);
/// assert_eq!(index.level, 3);
/// assert_eq!(index.to_string(), "L3/5/2");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileIndex {
    /// Zoom level (0 = whole fractal in one tile)
    pub level: u8,
    /// Column
    pub x: i64,
    /// Row (image-row convention)
    pub y: i64,
}

impl TileIndex {
    /// Create a new tile index.
    pub fn new(level: u8, x: i64, y: i64) -> Self {
        Self { level, x, y }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}/{}/{}", self.level, self.x, self.y)
    }
}

/// Axis-aligned rectangle of the complex plane.
///
/// `xmin`/`width` run along the real axis, `ymin`/`height` along the
/// imaginary axis (upward).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneRegion {
    pub xmin: f64,
    pub ymin: f64,
    pub width: f64,
    pub height: f64,
}

impl PlaneRegion {
    /// Create a region from its lower-left corner and extent.
    pub fn new(xmin: f64, ymin: f64, width: f64, height: f64) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
        }
    }

    /// Create a region from its corner bounds.
    ///
    /// ```
    /// use mandeltiles::coord::PlaneRegion;
    ///
    /// let r = PlaneRegion::from_bounds(-1.7, -1.3, 0.8, 1.2);
    /// assert_eq!(r.width, 2.5);
    /// assert_eq!(r.height, 2.5);
    /// ```
    pub fn from_bounds(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self::new(xmin, ymin, xmax - xmin, ymax - ymin)
    }

    pub fn xmax(&self) -> f64 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f64 {
        self.ymin + self.height
    }

    /// True if the point lies inside the half-open rectangle
    /// `[xmin, xmax) × [ymin, ymax)`.
    pub fn contains(&self, re: f64, im: f64) -> bool {
        re >= self.xmin && re < self.xmax() && im >= self.ymin && im < self.ymax()
    }

    /// True if the two regions share a positive-area intersection.
    ///
    /// Regions that only touch along an edge do not overlap, including
    /// edges that differ by floating-point rounding.
    pub fn overlaps(&self, other: &PlaneRegion) -> bool {
        let x_overlap = self.xmax().min(other.xmax()) - self.xmin.max(other.xmin);
        let y_overlap = self.ymax().min(other.ymax()) - self.ymin.max(other.ymin);
        let x_tolerance = self.width.min(other.width) * EDGE_TOLERANCE;
        let y_tolerance = self.height.min(other.height) * EDGE_TOLERANCE;
        x_overlap > x_tolerance && y_overlap > y_tolerance
    }

    /// True if every component is finite and both extents are positive.
    pub fn is_well_formed(&self) -> bool {
        self.xmin.is_finite()
            && self.ymin.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }
}

impl fmt::Display for PlaneRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] × [{}, {}]",
            self.xmin,
            self.xmax(),
            self.ymin,
            self.ymax()
        )
    }
}
