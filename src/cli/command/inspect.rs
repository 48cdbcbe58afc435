//! Checks of how a CAMELS basin polygon lines up with a gridded dataset.
//!
//! Each check writes tables into the project's test data directory that can be
//! dragged into a GIS next to the basin shapefile.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::{
    basin::{write_basins, Basin},
    camels::CamelsCatalog,
    cli::InspectArgs,
    config::Settings,
    crs::{reprojector, Crs, Reproject},
    export::{CellTable, ExportFormat},
    grid::{clip_to_polygon, Bounds, Grid},
};

const NOMASK_SUFFIX: &str = "2000_01_01-03_nomask.nc";
const FROM_URLS_SUFFIX: &str = "2000_01_01-03_from_urls.nc";

/// Basin bounds against the extent of the data, each `true` when the basin
/// lies inside the data on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FootprintComparison {
    pub west: bool,
    pub east: bool,
    pub north: bool,
    pub south: bool,
}

impl FootprintComparison {
    pub fn covers(&self) -> bool {
        self.west && self.east && self.north && self.south
    }
}

impl fmt::Display for FootprintComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "basin west > data west: {}", self.west)?;
        writeln!(f, "basin east < data east: {}", self.east)?;
        writeln!(f, "basin north < data north: {}", self.north)?;
        write!(f, "basin south > data south: {}", self.south)
    }
}

pub fn compare_footprint(basin: &Bounds, data: &Bounds) -> FootprintComparison {
    FootprintComparison {
        west: basin.west > data.west,
        east: basin.east < data.east,
        north: basin.north < data.north,
        south: basin.south > data.south,
    }
}

/// Writes the first time step of the variable as `load_to_qgis`.
pub fn inspect_export(settings: &Settings, args: &InspectArgs) -> Result<PathBuf> {
    let file = grid_file(settings, args, NOMASK_SUFFIX);
    let grid = load_grid(&file, &args.variable)?;

    export_grid(&grid, &args.variable, &output_dir(settings)?, args.format)
}

/// Compares the WGS84 bounds of the basin with the extent of the data.
pub fn inspect_footprint(settings: &Settings, args: &InspectArgs) -> Result<FootprintComparison> {
    let file = grid_file(settings, args, NOMASK_SUFFIX);
    let grid = load_grid(&file, &args.variable)?;
    let basin = CamelsCatalog::open(&settings.camels_dir())?.basin(&args.basin)?;

    footprint(&grid, &args.variable, &basin, reprojector().as_ref())
}

/// Masks the grid with the basin polygon and its bounding rectangle, and
/// saves both tables plus the basin shapefile.
pub fn inspect_mask(settings: &Settings, args: &InspectArgs) -> Result<Vec<PathBuf>> {
    let file = grid_file(settings, args, FROM_URLS_SUFFIX);
    let grid = load_grid(&file, &args.variable)?;
    let basin = CamelsCatalog::open(&settings.camels_dir())?.basin(&args.basin)?;

    mask_grid(
        &grid,
        &args.variable,
        &basin,
        &output_dir(settings)?,
        args.format,
        reprojector().as_ref(),
    )
}

fn export_grid(grid: &Grid, variable: &str, dir: &Path, format: ExportFormat) -> Result<PathBuf> {
    let table = CellTable::from_grid(grid, variable)?;
    info!(variable, rows = table.len(), "exporting grid cells");

    table.save(dir, "load_to_qgis", format)
}

fn footprint(
    grid: &Grid,
    variable: &str,
    basin: &Basin,
    reprojector: &dyn Reproject,
) -> Result<FootprintComparison> {
    let basin = basin.to_crs(&Crs::wgs84(), reprojector)?;
    let basin_bounds = basin
        .bounds()
        .ok_or_else(|| anyhow!("Basin `{}` has an empty polygon", basin.identifier))?;
    let data_extent = CellTable::from_grid(grid, variable)?
        .extent()
        .ok_or_else(|| anyhow!("`{}` has no complete cells", variable))?;
    info!(basin = ?basin_bounds, data = ?data_extent, "comparing footprint");

    Ok(compare_footprint(&basin_bounds, &data_extent))
}

fn mask_grid(
    grid: &Grid,
    variable: &str,
    basin: &Basin,
    dir: &Path,
    format: ExportFormat,
    reprojector: &dyn Reproject,
) -> Result<Vec<PathBuf>> {
    let in_grid_crs = basin.to_crs(&grid.crs, reprojector)?;
    let clip = clip_to_polygon(grid, &in_grid_crs.geometry)?;
    info!(
        basin = %basin.identifier,
        transform = ?clip.polygon.transform.coefficients(),
        bounds = ?clip.polygon.bounds.as_array(),
        cells = clip.polygon.mask.count(),
        "masked grid"
    );

    let geometry_file = CellTable::from_masked(&clip.polygon, variable)?.save(dir, "geometry_load_to_qgis", format)?;
    let bound_file = CellTable::from_masked(&clip.rectangle, variable)?.save(dir, "bound_load_to_qgis", format)?;

    let shp_file = dir.join(format!("{}_camels.shp", basin.identifier));
    write_basins(&[basin.to_crs(&Crs::wgs84(), reprojector)?], &shp_file)?;

    Ok(vec![geometry_file, bound_file, shp_file])
}

fn grid_file(settings: &Settings, args: &InspectArgs, suffix: &str) -> PathBuf {
    args.file.clone().unwrap_or_else(|| {
        settings
            .test_data_dir()
            .join(format!("{}_{}", args.basin, suffix))
    })
}

fn output_dir(settings: &Settings) -> Result<PathBuf> {
    let dir = settings.test_data_dir();
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create `{}`", dir.display()))?;

    Ok(dir)
}

#[cfg(feature = "netcdf")]
fn load_grid(file: &Path, variable: &str) -> Result<Grid> {
    crate::grid::nc::open_grid(file, &[variable])
}

#[cfg(not(feature = "netcdf"))]
fn load_grid(file: &Path, _variable: &str) -> Result<Grid> {
    Err(anyhow!(
        "Cannot read `{}`: hydrofetch was built without NetCDF support, rebuild with `--features netcdf`",
        file.display()
    ))
}

// -- Tests -------------------------------------------------------------------
