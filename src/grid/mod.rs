//! Gridded datasets, pixel transforms and basin masks.

pub mod clip;
pub mod mask;
#[cfg(feature = "netcdf")]
pub mod nc;
pub mod transform;

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Array3, ArrayView2, Axis, Zip};

use crate::{crs::Crs, error::GeoError};

pub use clip::{clip_to_polygon, MaskedGrid};
pub use mask::Mask;
pub use transform::{padded_bounds, Bounds, GridTransform};

/// Which way the rows of a grid run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    /// Row 0 is the northern edge (y decreasing).
    NorthUp,
    /// Row 0 is the southern edge (y increasing).
    SouthUp,
}

/// A (time, y, x) dataset with 2-D latitude/longitude coordinates.
///
/// Missing values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub lat: Array2<f64>,
    pub lon: Array2<f64>,
    pub variables: BTreeMap<String, Array3<f64>>,
    pub crs: Crs,
}

impl Grid {
    pub fn new(
        x: Array1<f64>,
        y: Array1<f64>,
        lat: Array2<f64>,
        lon: Array2<f64>,
        crs: Crs,
    ) -> Result<Self, GeoError> {
        let expected = (y.len(), x.len());
        for coord in [&lat, &lon] {
            if coord.dim() != expected {
                return Err(GeoError::ShapeMismatch {
                    expected,
                    found: coord.dim(),
                });
            }
        }

        Ok(Grid {
            x,
            y,
            lat,
            lon,
            variables: BTreeMap::new(),
            crs,
        })
    }

    /// Builds a grid on a regular lon/lat lattice, broadcasting the axes.
    pub fn geographic(lon: Array1<f64>, lat: Array1<f64>) -> Self {
        let (height, width) = (lat.len(), lon.len());
        let lat2 = Array2::from_shape_fn((height, width), |(row, _)| lat[row]);
        let lon2 = Array2::from_shape_fn((height, width), |(_, col)| lon[col]);

        Grid {
            x: lon,
            y: lat,
            lat: lat2,
            lon: lon2,
            variables: BTreeMap::new(),
            crs: Crs::wgs84(),
        }
    }

    pub fn with_variable(mut self, name: &str, data: Array3<f64>) -> Result<Self, GeoError> {
        let found = (data.len_of(Axis(1)), data.len_of(Axis(2)));
        if found != self.shape() {
            return Err(GeoError::ShapeMismatch {
                expected: self.shape(),
                found,
            });
        }
        self.variables.insert(name.to_string(), data);

        Ok(self)
    }

    pub fn height(&self) -> usize {
        self.y.len()
    }

    pub fn width(&self) -> usize {
        self.x.len()
    }

    /// (height, width)
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    pub fn row_order(&self) -> RowOrder {
        let n = self.y.len();
        if n > 1 && self.y[0] < self.y[n - 1] {
            RowOrder::SouthUp
        } else {
            RowOrder::NorthUp
        }
    }

    pub fn variable(&self, name: &str) -> Result<&Array3<f64>, GeoError> {
        self.variables
            .get(name)
            .ok_or_else(|| GeoError::MissingVariable(name.to_string()))
    }

    /// The first time step of a variable.
    pub fn first_slice(&self, name: &str) -> Result<ArrayView2<'_, f64>, GeoError> {
        let data = self.variable(name)?;
        if data.len_of(Axis(0)) == 0 {
            return Err(GeoError::EmptyVariable(name.to_string()));
        }

        Ok(data.index_axis(Axis(0), 0))
    }

    /// Keeps the rows and columns holding at least one selected cell and sets
    /// every data value outside the mask to NaN. Coordinates are not masked.
    pub fn masked(&self, mask: &Mask) -> Result<Grid, GeoError> {
        if mask.shape() != self.shape() {
            return Err(GeoError::ShapeMismatch {
                expected: self.shape(),
                found: mask.shape(),
            });
        }

        if mask.is_empty() {
            return Err(GeoError::EmptyMask);
        }

        let cells = mask.cells();
        let rows: Vec<usize> = cells
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().any(|&c| c))
            .map(|(i, _)| i)
            .collect();
        let cols: Vec<usize> = cells
            .axis_iter(Axis(1))
            .enumerate()
            .filter(|(_, col)| col.iter().any(|&c| c))
            .map(|(j, _)| j)
            .collect();

        let kept = cells.select(Axis(0), &rows).select(Axis(1), &cols);

        let mut variables = BTreeMap::new();
        for (name, data) in &self.variables {
            let mut clipped = data.select(Axis(1), &rows).select(Axis(2), &cols);
            for mut slice in clipped.outer_iter_mut() {
                Zip::from(&mut slice).and(&kept).for_each(|value, &inside| {
                    if !inside {
                        *value = f64::NAN;
                    }
                });
            }
            variables.insert(name.clone(), clipped);
        }

        Ok(Grid {
            x: self.x.select(Axis(0), &cols),
            y: self.y.select(Axis(0), &rows),
            lat: self.lat.select(Axis(0), &rows).select(Axis(1), &cols),
            lon: self.lon.select(Axis(0), &rows).select(Axis(1), &cols),
            variables,
            crs: self.crs.clone(),
        })
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use ndarray::{array, Array1, Array3};

    use super::*;

    /// 0.125 degree lattice, width 4, height 3, north-up, prcp = row * 10 + col.
    pub(crate) fn grid_fixture() -> Grid {
        let lon = Array1::from(vec![-70.0, -69.875, -69.75, -69.625]);
        let lat = Array1::from(vec![46.25, 46.125, 46.0]);
        let prcp = Array3::from_shape_fn((2, 3, 4), |(t, row, col)| {
            (t * 100 + row * 10 + col) as f64
        });

        Grid::geographic(lon, lat).with_variable("prcp", prcp).unwrap()
    }

    #[test]
    fn should_broadcast_geographic_axes() {
        let grid = grid_fixture();

        assert_eq!(grid.shape(), (3, 4));
        assert_eq!(grid.lat[[2, 3]], 46.0);
        assert_eq!(grid.lon[[2, 3]], -69.625);
        assert_eq!(grid.row_order(), RowOrder::NorthUp);
    }

    #[test]
    fn should_reject_variable_with_wrong_shape() {
        let err = grid_fixture()
            .with_variable("tmax", Array3::zeros((1, 4, 3)))
            .unwrap_err();

        assert_eq!(
            err,
            GeoError::ShapeMismatch {
                expected: (3, 4),
                found: (4, 3)
            }
        );
    }

    #[test]
    fn should_report_missing_variable() {
        let grid = grid_fixture();

        assert_eq!(
            grid.first_slice("swe").unwrap_err(),
            GeoError::MissingVariable("swe".to_string())
        );
        assert_eq!(grid.first_slice("prcp").unwrap()[[1, 2]], 12.0);
    }

    #[test]
    fn should_crop_and_blank_outside_mask() {
        let grid = grid_fixture();
        let mask = Mask::new(array![
            [false, false, false, false],
            [false, true, true, false],
            [false, false, true, false],
        ]);

        let masked = grid.masked(&mask).unwrap();

        assert_eq!(masked.shape(), (2, 2));
        assert_eq!(masked.x, array![-69.875, -69.75]);
        assert_eq!(masked.y, array![46.125, 46.0]);

        let prcp = masked.first_slice("prcp").unwrap();
        assert_eq!(prcp[[0, 0]], 11.0);
        assert_eq!(prcp[[0, 1]], 12.0);
        assert!(prcp[[1, 0]].is_nan());
        assert_eq!(prcp[[1, 1]], 22.0);

        // coordinates survive so that rows can be dropped later on the data
        assert_eq!(masked.lat[[1, 0]], 46.0);
    }

    #[test]
    fn should_reject_mask_of_other_shape() {
        let mask = Mask::new(Array2::from_elem((4, 3), true));

        assert!(matches!(
            grid_fixture().masked(&mask),
            Err(GeoError::ShapeMismatch { .. })
        ));
    }
}
