//! Boolean cell masks.

use geo::{BoundingRect, Contains, MultiPolygon, Point};
use ndarray::{s, Array2, ArrayView2};

use super::{GridTransform, RowOrder};
use crate::error::GeoError;

/// (height, width) grid of cells, true where the cell is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask(Array2<bool>);

impl Mask {
    pub fn new(cells: Array2<bool>) -> Self {
        Mask(cells)
    }

    /// Selects every cell whose centre lies strictly inside `geometry`.
    ///
    /// A centre exactly on the polygon boundary is left out (`Contains`
    /// excludes the boundary), where GDAL's rasterizer may burn it in.
    ///
    /// `geometry` must already be in the grid's CRS. Pixel centres come from
    /// the north-up `transform`; a south-up grid is flipped so that row `i`
    /// of the mask is row `i` of the data.
    pub fn from_polygon(
        geometry: &MultiPolygon<f64>,
        transform: &GridTransform,
        shape: (usize, usize),
        order: RowOrder,
    ) -> Self {
        let (height, _) = shape;
        let Some(envelope) = geometry.bounding_rect() else {
            return Mask(Array2::from_elem(shape, false));
        };

        let cells = Array2::from_shape_fn(shape, |(row, col)| {
            let north_row = match order {
                RowOrder::NorthUp => row,
                RowOrder::SouthUp => height - 1 - row,
            };
            let centre = transform.pixel_center(north_row, col);
            envelope.contains(&centre) && geometry.contains(&Point::from(centre))
        });

        Mask(cells)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.0.dim()
    }

    pub fn cells(&self) -> ArrayView2<'_, bool> {
        self.0.view()
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&c| c).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Inclusive (row_min, row_max, col_min, col_max) of the selected cells.
    pub fn extent(&self) -> Option<(usize, usize, usize, usize)> {
        self.0
            .indexed_iter()
            .filter(|(_, c)| **c)
            .fold(None, |acc, ((row, col), _)| {
                Some(match acc {
                    None => (row, row, col, col),
                    Some((r0, r1, c0, c1)) => (r0.min(row), r1.max(row), c0.min(col), c1.max(col)),
                })
            })
    }

    /// The smallest rectangle of cells covering every selected cell.
    pub fn bounding(&self) -> Result<Mask, GeoError> {
        let (r0, r1, c0, c1) = self.extent().ok_or(GeoError::EmptyMask)?;
        let mut cells = Array2::from_elem(self.shape(), false);
        cells.slice_mut(s![r0..=r1, c0..=c1]).fill(true);

        Ok(Mask(cells))
    }
}

// -- Tests -------------------------------------------------------------------
