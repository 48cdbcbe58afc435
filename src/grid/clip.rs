//! Clipping a grid to a basin polygon and to the polygon's cell rectangle.

use geo::{BoundingRect, MultiPolygon};
use tracing::debug;

use super::{padded_bounds, Bounds, Grid, GridTransform, Mask};
use crate::error::GeoError;

/// A masked grid together with the transform and polygon bounds it was cut with.
#[derive(Debug, Clone)]
pub struct MaskedGrid {
    pub grid: Grid,
    pub mask: Mask,
    pub transform: GridTransform,
    pub bounds: Bounds,
}

/// The two masked views of one basin.
#[derive(Debug, Clone)]
pub struct BasinClip {
    /// Cells whose centre falls in the polygon.
    pub polygon: MaskedGrid,
    /// Every cell in the rectangle spanned by `polygon`.
    pub rectangle: MaskedGrid,
}

/// Masks `grid` with `geometry`, which must already be in the grid's CRS.
pub fn clip_to_polygon(grid: &Grid, geometry: &MultiPolygon<f64>) -> Result<BasinClip, GeoError> {
    let (height, width) = grid.shape();
    let transform = GridTransform::from_bounds(padded_bounds(grid.x.view(), grid.y.view())?, width, height);
    let bounds = geometry
        .bounding_rect()
        .map(Bounds::from_rect)
        .ok_or(GeoError::EmptyMask)?;

    let mask = Mask::from_polygon(geometry, &transform, grid.shape(), grid.row_order());
    let mask_bound = mask.bounding()?;
    debug!(
        inside = mask.count(),
        rectangle = mask_bound.count(),
        ?transform,
        "masked grid to basin"
    );

    Ok(BasinClip {
        polygon: MaskedGrid {
            grid: grid.masked(&mask)?,
            mask,
            transform,
            bounds,
        },
        rectangle: MaskedGrid {
            grid: grid.masked(&mask_bound)?,
            mask: mask_bound,
            transform,
            bounds,
        },
    })
}

// -- Tests -------------------------------------------------------------------
