//! Affine georeferencing for rasters and reflectance images

use serde::{Deserialize, Serialize};

/// Affine transformation from pixel coordinates (col, row) to geographic
/// coordinates (x = longitude, y = latitude for geographic grids):
///
/// ```text
/// x = origin_x + col * pixel_width
/// y = origin_y + row * pixel_height
/// ```
///
/// Imagery handed to the analysis layers is co-registered and north-up, so
/// rotation terms are not modelled. `pixel_height` is negative for north-up grids.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in X
    pub pixel_width: f64,
    /// Cell size in Y (usually negative)
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Geographic coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` for a grid of the given size
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let x0 = self.origin_x;
        let x1 = self.origin_x + cols as f64 * self.pixel_width;
        let y0 = self.origin_y;
        let y1 = self.origin_y + rows as f64 * self.pixel_height;
        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Center `(x, y)` of a grid of the given size
    pub fn center(&self, cols: usize, rows: usize) -> (f64, f64) {
        let (min_x, min_y, max_x, max_y) = self.bounds(cols, rows);
        ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0)
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_center() {
        let gt = GeoTransform::new(77.0, 29.0, 0.001, -0.001);
        let (x, y) = gt.pixel_to_geo(0, 0);
        assert_relative_eq!(x, 77.0005, epsilon = 1e-12);
        assert_relative_eq!(y, 28.9995, epsilon = 1e-12);
    }

    #[test]
    fn test_bounds_and_center() {
        let gt = GeoTransform::new(88.0, 26.0, 0.01, -0.01);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 200);
        assert_relative_eq!(min_x, 88.0);
        assert_relative_eq!(max_x, 89.0, epsilon = 1e-9);
        assert_relative_eq!(min_y, 24.0, epsilon = 1e-9);
        assert_relative_eq!(max_y, 26.0);

        let (cx, cy) = gt.center(100, 200);
        assert_relative_eq!(cx, 88.5, epsilon = 1e-9);
        assert_relative_eq!(cy, 25.0, epsilon = 1e-9);
    }
}
