//! Reads a [`Grid`] from a NetCDF file.
//!
//! Two layouts are understood:
//! - projected grids (Daymet) with 1-D `x`/`y` axes, 2-D `lat`/`lon`
//!   coordinates and the CRS in a global `crs` attribute or in the
//!   `grid_mapping` variable;
//! - regular lon/lat grids (NLDAS) with 1-D `lon`/`lat` axes.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ndarray::{Array1, Array2, Array3};
use netcdf::AttributeValue;
use tracing::debug;

use super::Grid;
use crate::crs::Crs;

pub fn open_grid(path: &Path, variables: &[&str]) -> Result<Grid> {
    let file = netcdf::open(path).with_context(|| format!("Failed to open `{}`", path.display()))?;

    let mut grid = if file.variable("x").is_some() && file.variable("y").is_some() {
        let x = read_axis(&file, "x")?;
        let y = read_axis(&file, "y")?;
        let shape = (y.len(), x.len());
        let lat = read_plane(&file, "lat", shape)?;
        let lon = read_plane(&file, "lon", shape)?;
        let crs = read_crs(&file, variables).unwrap_or_else(Crs::wgs84);
        Grid::new(x, y, lat, lon, crs)?
    } else {
        Grid::geographic(read_axis(&file, "lon")?, read_axis(&file, "lat")?)
    };
    debug!(path = %path.display(), shape = ?grid.shape(), crs = %grid.crs, "opened grid");

    for &name in variables {
        let data = read_variable(&file, name, grid.shape())?;
        grid = grid.with_variable(name, data)?;
    }

    Ok(grid)
}

fn read_axis(file: &netcdf::File, name: &str) -> Result<Array1<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| anyhow!("Missing coordinate variable `{}`", name))?;
    let values: Vec<f64> = var
        .get_values(..)
        .with_context(|| format!("Failed to read `{}`", name))?;

    Ok(Array1::from(values))
}

fn read_plane(file: &netcdf::File, name: &str, shape: (usize, usize)) -> Result<Array2<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| anyhow!("Missing coordinate variable `{}`", name))?;
    let values: Vec<f64> = var
        .get_values(..)
        .with_context(|| format!("Failed to read `{}`", name))?;

    Array2::from_shape_vec(shape, values)
        .with_context(|| format!("`{}` is not shaped {:?}", name, shape))
}

/// Reads a (time, y, x) or (y, x) variable, applying fill value, scale and offset.
fn read_variable(file: &netcdf::File, name: &str, shape: (usize, usize)) -> Result<Array3<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| anyhow!("Missing data variable `{}`", name))?;
    let raw: Vec<f64> = var
        .get_values(..)
        .with_context(|| format!("Failed to read `{}`", name))?;

    let fill = f64_attr(&var, "_FillValue").or_else(|| f64_attr(&var, "missing_value"));
    let scale = f64_attr(&var, "scale_factor").unwrap_or(1.0);
    let offset = f64_attr(&var, "add_offset").unwrap_or(0.0);

    let values: Vec<f64> = raw
        .into_iter()
        .map(|v| match fill {
            Some(fill) if v == fill => f64::NAN,
            _ => v * scale + offset,
        })
        .collect();

    let (height, width) = shape;
    let steps = match var.dimensions().len() {
        2 => 1,
        3 => var.dimensions()[0].len(),
        n => return Err(anyhow!("`{}` has {} dimensions, expected 2 or 3", name, n)),
    };

    Array3::from_shape_vec((steps, height, width), values)
        .with_context(|| format!("`{}` is not shaped {:?}", name, (steps, height, width)))
}

fn read_crs(file: &netcdf::File, variables: &[&str]) -> Option<Crs> {
    if let Some(crs) = file.attribute("crs").and_then(|a| a.value().ok()).and_then(text) {
        return Some(Crs::new(crs));
    }

    // CF convention: data variable -> grid_mapping variable -> crs_wkt / spatial_ref
    let mapping = variables
        .iter()
        .filter_map(|name| file.variable(name))
        .find_map(|var| var.attribute_value("grid_mapping")?.ok().and_then(text))?;
    let mapping = file.variable(&mapping)?;
    ["crs_wkt", "spatial_ref", "proj4", "proj4string"]
        .iter()
        .find_map(|attr| mapping.attribute_value(attr)?.ok().and_then(text))
        .map(Crs::new)
}

fn f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    let value = var.attribute_value(name)?.ok()?;
    f64::try_from(value).ok()
}

fn text(value: AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}
