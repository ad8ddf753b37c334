//! Tile index to complex-plane mapping.
//!
//! Each zoom level splits the root region into `2^level × 2^level` tiles.
//! The indexing is centered: at every level above 0, index `(0, 0)` is the
//! tile just below and to the right of the root's center. Rows are flipped
//! relative to the plane, so increasing `y` moves down the image and down
//! the imaginary axis.

mod types;

pub use types::{PlaneRegion, TileIndex, MAX_SUPPORTED_LEVEL};

/// Root region covering the whole Mandelbrot set.
pub const DEFAULT_ROOT_BOUNDS: (f64, f64, f64, f64) = (-1.7, -1.3, 0.8, 1.2);

/// Default shallowest zoom level.
pub const DEFAULT_MIN_LEVEL: u8 = 0;

/// Default deepest zoom level.
pub const DEFAULT_MAX_LEVEL: u8 = 31;

/// Returns the number of tiles along one side of the grid at `level`.
///
/// Saturates at `i64::MAX` from level 63, where `2^level` no longer fits.
///
/// # Example
///
/// ```
/// use mandeltiles::coord::side_tiles_count;
///
/// assert_eq!(side_tiles_count(0), 1);
/// assert_eq!(side_tiles_count(3), 8);
/// ```
#[inline]
pub fn side_tiles_count(level: u8) -> i64 {
    if u32::from(level) >= i64::BITS - 1 {
        i64::MAX
    } else {
        1i64 << level
    }
}

/// Returns the default root region.
pub fn default_root() -> PlaneRegion {
    let (xmin, ymin, xmax, ymax) = DEFAULT_ROOT_BOUNDS;
    PlaneRegion::from_bounds(xmin, ymin, xmax, ymax)
}

/// Maps tile indices to complex-plane regions.
///
/// Stateless apart from its fixed root region and served level range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneMapper {
    root: PlaneRegion,
    min_level: u8,
    max_level: u8,
}

impl PlaneMapper {
    /// Create a mapper over `root` serving levels `min_level..=max_level`.
    pub fn new(root: PlaneRegion, min_level: u8, max_level: u8) -> Self {
        Self {
            root,
            min_level,
            max_level: max_level.min(MAX_SUPPORTED_LEVEL),
        }
    }

    pub fn root(&self) -> PlaneRegion {
        self.root
    }

    pub fn min_level(&self) -> u8 {
        self.min_level
    }

    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    /// Computes the plane region covered by `index`.
    ///
    /// With `S = 2^level`:
    ///
    /// ```text
    /// width  = root.width  / S
    /// height = root.height / S
    /// xmin   = root.xmin + (x + S/2) * width
    /// ymin   = root.ymin + (S/2 - y - 1) * height
    /// ```
    ///
    /// `S/2` is integer division, so at level 0 it is zero. The sums are
    /// taken in `f64`, so any index maps without overflow; only indices
    /// accepted by [`contains`](Self::contains) map exactly.
    #[inline]
    pub fn map_tile(&self, index: &TileIndex) -> PlaneRegion {
        let side = 2f64.powi(i32::from(index.level));
        let half = if index.level == 0 { 0.0 } else { side / 2.0 };

        let width = self.root.width / side;
        let height = self.root.height / side;
        let xmin = self.root.xmin + (index.x as f64 + half) * width;
        let ymin = self.root.ymin + (half - index.y as f64 - 1.0) * height;

        PlaneRegion::new(xmin, ymin, width, height)
    }

    /// Whether tiles for `index` are served.
    ///
    /// The level must be in the served range, and `x + S/2` and
    /// `S/2 - y - 1` must fit in `i64`. Columns and rows outside the root are
    /// otherwise accepted.
    pub fn contains(&self, index: &TileIndex) -> bool {
        if index.level > MAX_SUPPORTED_LEVEL
            || !(self.min_level..=self.max_level).contains(&index.level)
        {
            return false;
        }

        let half = side_tiles_count(index.level) / 2;
        let column = index.x.checked_add(half);
        let row = half.checked_sub(index.y).and_then(|r| r.checked_sub(1));
        column.is_some() && row.is_some()
    }

    /// Tiles at `level` that exactly cover the root region, row by row from
    /// the top.
    ///
    /// Columns run `-S/2..S - S/2` and rows `S/2 - S..S/2`, so at level 0
    /// the single tile is `(0, -1)`.
    pub fn tiles_covering_root(level: u8) -> impl Iterator<Item = TileIndex> {
        let side = side_tiles_count(level);
        let half = side / 2;
        (half - side..half)
            .flat_map(move |y| (-half..side - half).map(move |x| TileIndex::new(level, x, y)))
    }
}

impl Default for PlaneMapper {
    fn default() -> Self {
        Self::new(default_root(), DEFAULT_MIN_LEVEL, DEFAULT_MAX_LEVEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_default_root() {
        let root = default_root();
        assert_eq!(root.xmin, -1.7);
        assert_eq!(root.ymin, -1.3);
        assert!(approx_eq(root.width, 2.5));
        assert!(approx_eq(root.height, 2.5));
    }

    #[test]
    fn test_level_zero_is_root_shifted_down_one_tile() {
        // S/2 = 0 at level 0, so the row term is -1 tile
        let root = PlaneRegion::new(-1.7, -1.3, 2.5, 2.5);
        let mapper = PlaneMapper::new(root, 0, 31);
        let region = mapper.map_tile(&TileIndex::new(0, 0, 0));

        assert_eq!(region.xmin, -1.7);
        assert_eq!(region.width, 2.5);
        assert_eq!(region.height, 2.5);
        assert_eq!(region.ymin, -1.3 - 2.5);
    }

    #[test]
    fn test_level_one_tile_size() {
        let root = PlaneRegion::new(-1.7, -1.3, 2.5, 2.5);
        let mapper = PlaneMapper::new(root, 0, 31);
        let region = mapper.map_tile(&TileIndex::new(1, 0, 0));
        assert_eq!(region.width, 1.25);
        assert_eq!(region.height, 1.25);
    }

    #[test]
    fn test_level_one_origin_tile_starts_at_root_center() {
        let root = PlaneRegion::new(-1.7, -1.3, 2.5, 2.5);
        let mapper = PlaneMapper::new(root, 0, 31);
        let region = mapper.map_tile(&TileIndex::new(1, 0, 0));
        // xmin = -1.7 + 1 * 1.25, ymin = -1.3 + 0 * 1.25
        assert!(approx_eq(region.xmin, -0.45));
        assert!(approx_eq(region.ymin, -1.3));
    }

    #[test]
    fn test_level_one_quadrants_reconstruct_root() {
        let root = PlaneRegion::new(-1.7, -1.3, 2.5, 2.5);
        let mapper = PlaneMapper::new(root, 0, 31);

        // The four level-1 tiles whose indices straddle the origin
        let tiles: Vec<PlaneRegion> = [(-1, -1), (0, -1), (-1, 0), (0, 0)]
            .iter()
            .map(|&(x, y)| mapper.map_tile(&TileIndex::new(1, x, y)))
            .collect();

        for (i, a) in tiles.iter().enumerate() {
            for b in tiles.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{} overlaps {}", a, b);
            }
        }

        let xmin = tiles.iter().map(|r| r.xmin).fold(f64::INFINITY, f64::min);
        let ymin = tiles.iter().map(|r| r.ymin).fold(f64::INFINITY, f64::min);
        let xmax = tiles.iter().map(|r| r.xmax()).fold(f64::NEG_INFINITY, f64::max);
        let ymax = tiles.iter().map(|r| r.ymax()).fold(f64::NEG_INFINITY, f64::max);

        assert!(approx_eq(xmin, root.xmin));
        assert!(approx_eq(ymin, root.ymin));
        assert!(approx_eq(xmax, root.xmax()));
        assert!(approx_eq(ymax, root.ymax()));
    }

    #[test]
    fn test_level_zero_root_tile_is_row_minus_one() {
        let root = PlaneRegion::new(-1.7, -1.3, 2.5, 2.5);
        let mapper = PlaneMapper::new(root, 0, 31);
        assert_eq!(mapper.map_tile(&TileIndex::new(0, 0, -1)), root);
    }

    #[test]
    fn test_tiles_covering_root() {
        let root = PlaneRegion::new(-1.7, -1.3, 2.5, 2.5);
        let mapper = PlaneMapper::new(root, 0, 31);

        let level0: Vec<_> = PlaneMapper::tiles_covering_root(0).collect();
        assert_eq!(level0, vec![TileIndex::new(0, 0, -1)]);

        let level2: Vec<_> = PlaneMapper::tiles_covering_root(2).collect();
        assert_eq!(level2.len(), 16);
        assert_eq!(level2[0], TileIndex::new(2, -2, -2));
        assert_eq!(level2[15], TileIndex::new(2, 1, 1));

        // Every tile lies inside the root
        for index in level2 {
            let region = mapper.map_tile(&index);
            assert!(region.xmin >= root.xmin - 1e-12 && region.xmax() <= root.xmax() + 1e-12);
            assert!(region.ymin >= root.ymin - 1e-12 && region.ymax() <= root.ymax() + 1e-12);
        }
    }

    #[test]
    fn test_diagonal_tiles_are_distinct_quadrants() {
        let root = PlaneRegion::new(-1.7, -1.3, 2.5, 2.5);
        let mapper = PlaneMapper::new(root, 0, 31);
        let a = mapper.map_tile(&TileIndex::new(1, 0, 0));
        let b = mapper.map_tile(&TileIndex::new(1, 1, 1));

        assert!(!a.overlaps(&b));
        // x grows right, y grows down the image and therefore down the plane
        assert!(approx_eq(b.xmin, a.xmax()));
        assert!(approx_eq(b.ymax(), a.ymin));
    }

    #[test]
    fn test_increasing_y_moves_down_the_plane() {
        let mapper = PlaneMapper::default();
        let upper = mapper.map_tile(&TileIndex::new(4, 2, 3));
        let lower = mapper.map_tile(&TileIndex::new(4, 2, 4));
        assert!(lower.ymin < upper.ymin);
        assert!(approx_eq(lower.ymax(), upper.ymin));
    }

    #[test]
    fn test_contains_checks_level_range() {
        let mapper = PlaneMapper::new(default_root(), 2, 10);
        assert!(!mapper.contains(&TileIndex::new(1, 0, 0)));
        assert!(mapper.contains(&TileIndex::new(2, 0, 0)));
        assert!(mapper.contains(&TileIndex::new(10, -500, 9000)));
        assert!(!mapper.contains(&TileIndex::new(11, 0, 0)));
    }

    #[test]
    fn test_contains_rejects_unrepresentable_columns_and_rows() {
        let mapper = PlaneMapper::new(default_root(), 0, MAX_SUPPORTED_LEVEL);

        // x + S/2 overflows
        assert!(!mapper.contains(&TileIndex::new(1, i64::MAX, 0)));
        assert!(mapper.contains(&TileIndex::new(1, i64::MAX - 1, 0)));

        // S/2 - y - 1 overflows
        assert!(!mapper.contains(&TileIndex::new(1, 0, i64::MIN)));
        assert!(!mapper.contains(&TileIndex::new(0, 0, i64::MIN)));
        assert!(mapper.contains(&TileIndex::new(0, 0, i64::MIN + 1)));
        assert!(mapper.contains(&TileIndex::new(1, 0, i64::MIN + 2)));
    }

    #[test]
    fn test_contains_rejects_levels_past_supported() {
        let mapper = PlaneMapper::new(default_root(), 0, 255);
        assert!(mapper.contains(&TileIndex::new(MAX_SUPPORTED_LEVEL, 0, 0)));
        assert!(!mapper.contains(&TileIndex::new(MAX_SUPPORTED_LEVEL + 1, 0, 0)));
        assert!(!mapper.contains(&TileIndex::new(64, 0, 0)));
        assert!(!mapper.contains(&TileIndex::new(u8::MAX, 0, 0)));
    }

    #[test]
    fn test_side_tiles_count_saturates() {
        assert_eq!(side_tiles_count(62), 1i64 << 62);
        assert_eq!(side_tiles_count(63), i64::MAX);
        assert_eq!(side_tiles_count(64), i64::MAX);
        assert_eq!(side_tiles_count(u8::MAX), i64::MAX);
    }

    #[test]
    fn test_map_tile_does_not_overflow_on_extreme_indices() {
        let mapper = PlaneMapper::default();

        let deep = mapper.map_tile(&TileIndex::new(64, 0, 0));
        assert!(deep.width > 0.0 && deep.width.is_finite());

        let far = mapper.map_tile(&TileIndex::new(1, i64::MAX, i64::MIN));
        assert!(far.xmin.is_finite() && far.ymin.is_finite());

        let widest = mapper.map_tile(&TileIndex::new(u8::MAX, -1, -1));
        assert!(widest.xmin.is_finite());
    }

    #[test]
    fn test_max_level_is_clamped() {
        let mapper = PlaneMapper::new(default_root(), 0, 200);
        assert_eq!(mapper.max_level(), MAX_SUPPORTED_LEVEL);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_matches_closed_form(level in 0u8..=30, x in -1000i64..1000, y in -1000i64..1000) {
                let root = default_root();
                let mapper = PlaneMapper::new(root, 0, 31);
                let region = mapper.map_tile(&TileIndex::new(level, x, y));

                let s = side_tiles_count(level);
                let width = root.width / s as f64;
                let height = root.height / s as f64;

                prop_assert_eq!(region.width, width);
                prop_assert_eq!(region.height, height);
                prop_assert_eq!(region.xmin, root.xmin + (x + s / 2) as f64 * width);
                prop_assert_eq!(region.ymin, root.ymin + (s / 2 - y - 1) as f64 * height);
            }

            #[test]
            fn test_is_idempotent(level in 0u8..=62, x in any::<i32>(), y in any::<i32>()) {
                let mapper = PlaneMapper::default();
                let index = TileIndex::new(level, x as i64, y as i64);
                let a = mapper.map_tile(&index);
                let b = mapper.map_tile(&index);

                prop_assert_eq!(a.xmin.to_bits(), b.xmin.to_bits());
                prop_assert_eq!(a.ymin.to_bits(), b.ymin.to_bits());
                prop_assert_eq!(a.width.to_bits(), b.width.to_bits());
                prop_assert_eq!(a.height.to_bits(), b.height.to_bits());
            }

            #[test]
            fn test_horizontal_neighbours_share_an_edge(level in 1u8..=20, x in -100i64..100, y in -100i64..100) {
                let mapper = PlaneMapper::default();
                let left = mapper.map_tile(&TileIndex::new(level, x, y));
                let right = mapper.map_tile(&TileIndex::new(level, x + 1, y));

                prop_assert!((right.xmin - left.xmax()).abs() <= left.width * 1e-9);
                prop_assert!(!left.overlaps(&right));
            }
        }
    }
}
