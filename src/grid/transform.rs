//! Pixel resolution, padded bounds and the pixel-to-world affine transform.

use geo::{AffineTransform, Coord, Rect};
use ndarray::ArrayView1;
use serde::Serialize;

use crate::error::GeoError;

/// West/south/east/north extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Bounds {
            west: rect.min().x,
            south: rect.min().y,
            east: rect.max().x,
            north: rect.max().y,
        }
    }

    /// Grows each side by half a pixel.
    pub fn padded(self, x_res: f64, y_res: f64) -> Self {
        Bounds {
            west: self.west - x_res * 0.5,
            south: self.south - y_res * 0.5,
            east: self.east + x_res * 0.5,
            north: self.north + y_res * 0.5,
        }
    }

    /// The (west, south, east, north) tuple order used by shapely/rasterio.
    pub fn as_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }
}

/// `|max - min| / (n - 1)`. Assumes the axis is uniformly spaced.
pub fn pixel_resolution(axis: &'static str, values: ArrayView1<f64>) -> Result<f64, GeoError> {
    let n = values.len();
    if n < 2 {
        return Err(GeoError::TooFewSamples { axis, len: n });
    }
    let (min, max) = min_max(values);

    Ok((max - min).abs() / (n - 1) as f64)
}

/// Bounds of the cell edges, i.e. the coordinate extremes grown by half a pixel.
pub fn padded_bounds(x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<Bounds, GeoError> {
    let x_res = pixel_resolution("x", x)?;
    let y_res = pixel_resolution("y", y)?;
    let (west, east) = min_max(x);
    let (south, north) = min_max(y);

    Ok(Bounds {
        west,
        south,
        east,
        north,
    }
    .padded(x_res, y_res))
}

fn min_max(values: ArrayView1<f64>) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// North-up affine transform from pixel (col, row) to world (x, y).
///
/// Same convention as rasterio's `from_bounds`: origin at the north-west
/// corner, positive x step, negative y step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform {
    pub west: f64,
    pub north: f64,
    pub x_res: f64,
    pub y_res: f64,
}

impl GridTransform {
    pub fn from_bounds(bounds: Bounds, width: usize, height: usize) -> Self {
        GridTransform {
            west: bounds.west,
            north: bounds.north,
            x_res: (bounds.east - bounds.west) / width as f64,
            y_res: (bounds.north - bounds.south) / height as f64,
        }
    }

    pub fn to_affine(&self) -> AffineTransform<f64> {
        AffineTransform::new(self.x_res, 0.0, self.west, 0.0, -self.y_res, self.north)
    }

    /// World coordinate of the centre of a pixel, rows counted from the north.
    pub fn pixel_center(&self, row: usize, col: usize) -> Coord<f64> {
        self.to_affine().apply(Coord {
            x: col as f64 + 0.5,
            y: row as f64 + 0.5,
        })
    }

    /// Coefficients in (a, b, c, d, e, f) order.
    pub fn coefficients(&self) -> [f64; 6] {
        [self.x_res, 0.0, self.west, 0.0, -self.y_res, self.north]
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use geo::coord;
    use ndarray::array;

    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn should_compute_resolution_per_axis() {
        let x = array![-70.0, -69.875, -69.75, -69.625];
        let y = array![46.25, 46.125, 46.0];

        let x_res = pixel_resolution("x", x.view()).unwrap();
        let y_res = pixel_resolution("y", y.view()).unwrap();

        assert!((x_res - (-69.625 - -70.0) / 3.0).abs() < EPS);
        assert!((x_res - 0.125).abs() < EPS);
        assert!((y_res - (46.25 - 46.0) / 2.0).abs() < EPS);
        assert!((y_res - 0.125).abs() < EPS);
    }

    #[test]
    fn should_pad_bounds_by_half_a_pixel() {
        let x = array![-70.0, -69.875, -69.75, -69.625];
        let y = array![46.25, 46.125, 46.0];

        let bounds = padded_bounds(x.view(), y.view()).unwrap();

        assert!((bounds.west - (-70.0 - 0.0625)).abs() < EPS);
        assert!((bounds.east - (-69.625 + 0.0625)).abs() < EPS);
        assert!((bounds.south - (46.0 - 0.0625)).abs() < EPS);
        assert!((bounds.north - (46.25 + 0.0625)).abs() < EPS);
    }

    #[test]
    fn should_ignore_axis_direction() {
        let ascending = array![0.0, 1000.0, 2000.0];
        let descending = array![2000.0, 1000.0, 0.0];

        assert_eq!(
            pixel_resolution("y", ascending.view()).unwrap(),
            pixel_resolution("y", descending.view()).unwrap()
        );
    }

    #[test]
    fn should_reject_single_sample_axis() {
        let x = array![10.0];

        assert_eq!(
            pixel_resolution("x", x.view()).unwrap_err(),
            GeoError::TooFewSamples { axis: "x", len: 1 }
        );
    }

    #[test]
    fn should_map_pixel_centers_back_onto_coordinates() {
        let x = array![-70.0, -69.875, -69.75, -69.625];
        let y = array![46.25, 46.125, 46.0];
        let transform = GridTransform::from_bounds(padded_bounds(x.view(), y.view()).unwrap(), 4, 3);

        assert!((transform.x_res - 0.125).abs() < EPS);
        assert!((transform.y_res - 0.125).abs() < EPS);

        let corner = transform.pixel_center(0, 0);
        assert!((corner.x - -70.0).abs() < EPS);
        assert!((corner.y - 46.25).abs() < EPS);

        let last = transform.pixel_center(2, 3);
        assert!((last.x - -69.625).abs() < EPS);
        assert!((last.y - 46.0).abs() < EPS);
    }

    #[test]
    fn should_build_bounds_from_rect() {
        let rect = Rect::new(coord! { x: -69.5, y: 46.5 }, coord! { x: -70.5, y: 45.5 });

        assert_eq!(Bounds::from_rect(rect).as_array(), [-70.5, 45.5, -69.5, 46.5]);
    }
}
