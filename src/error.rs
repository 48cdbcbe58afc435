//! Errors raised by the grid, mask and CRS helpers.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("axis `{axis}` needs at least two samples to derive a resolution, found {len}")]
    TooFewSamples { axis: &'static str, len: usize },

    #[error("shape {found:?} does not match grid shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("mask selects no grid cells")]
    EmptyMask,

    #[error("variable `{0}` not found in grid")]
    MissingVariable(String),

    #[error("variable `{0}` has no time steps")]
    EmptyVariable(String),

    #[error("cannot reproject from `{from}` to `{to}`; rebuild with `--features proj`")]
    UnsupportedCrs { from: String, to: String },

    #[error("projection failed: {0}")]
    Projection(String),
}
