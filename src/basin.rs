//! Basin polygons and their shapefile representation.

use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use geo::{BoundingRect, MultiPolygon};
use shapefile::{
    dbase::{self, FieldName, FieldValue, TableWriterBuilder},
    Shape,
};
use tracing::debug;

use crate::{
    crs::{Crs, Reproject},
    error::GeoError,
    grid::Bounds,
};

const IDENTIFIER_FIELD: &str = "identifier";
const IDENTIFIER_WIDTH: u8 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct Basin {
    pub identifier: String,
    pub geometry: MultiPolygon<f64>,
    pub crs: Crs,
}

impl Basin {
    pub fn bounds(&self) -> Option<Bounds> {
        self.geometry.bounding_rect().map(Bounds::from_rect)
    }

    pub fn to_crs(&self, crs: &Crs, reprojector: &dyn Reproject) -> Result<Basin, GeoError> {
        Ok(Basin {
            identifier: self.identifier.clone(),
            geometry: reprojector.reproject(&self.geometry, &self.crs, crs)?,
            crs: crs.clone(),
        })
    }
}

/// Finds the shape whose numeric `key_field` equals `key` and returns it as a
/// multipolygon, or `None` when no record matches.
pub fn read_polygon(shp_path: &Path, key_field: &str, key: i64) -> Result<Option<MultiPolygon<f64>>> {
    let mut reader = shapefile::Reader::from_path(shp_path)
        .with_context(|| format!("Failed to open `{}`", shp_path.display()))?;

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;
        if record.get(key_field).and_then(numeric) != Some(key) {
            continue;
        }
        return match shape {
            Shape::Polygon(polygon) => Ok(Some(MultiPolygon::from(polygon))),
            Shape::PolygonM(polygon) => Ok(Some(MultiPolygon::from(polygon))),
            Shape::PolygonZ(polygon) => Ok(Some(MultiPolygon::from(polygon))),
            other => Err(anyhow!(
                "Record {} in `{}` is a {:?}, not a polygon",
                key,
                shp_path.display(),
                other.shapetype()
            )),
        };
    }

    Ok(None)
}

/// Reads the CRS from the `.prj` sidecar of a shapefile, if there is one.
pub fn read_prj(shp_path: &Path) -> Result<Option<Crs>> {
    let prj_path = shp_path.with_extension("prj");
    if !prj_path.exists() {
        return Ok(None);
    }
    let wkt = fs::read_to_string(&prj_path)
        .with_context(|| format!("Failed to read `{}`", prj_path.display()))?;

    Ok(Some(Crs::from_prj(&wkt)))
}

/// Writes one polygon record per basin, keyed by an `identifier` attribute,
/// plus a `.prj` sidecar when the CRS has a known WKT.
pub fn write_basins(basins: &[Basin], shp_path: &Path) -> Result<()> {
    let field = FieldName::try_from(IDENTIFIER_FIELD)
        .map_err(|_| anyhow!("Invalid dbase field name `{}`", IDENTIFIER_FIELD))?;
    let table = TableWriterBuilder::new().add_character_field(field, IDENTIFIER_WIDTH);
    let mut writer = shapefile::Writer::from_path(shp_path, table)
        .with_context(|| format!("Failed to create `{}`", shp_path.display()))?;

    for basin in basins {
        let polygon = shapefile::Polygon::from(basin.geometry.clone());
        let mut record = dbase::Record::default();
        record.insert(
            IDENTIFIER_FIELD.to_string(),
            FieldValue::Character(Some(basin.identifier.clone())),
        );
        writer.write_shape_and_record(&polygon, &record)?;
    }
    debug!(path = %shp_path.display(), count = basins.len(), "wrote basins");

    if let Some(wkt) = basins.first().and_then(|b| b.crs.esri_wkt()) {
        fs::write(shp_path.with_extension("prj"), wkt)?;
    }

    Ok(())
}

fn numeric(value: &FieldValue) -> Option<i64> {
    match value {
        FieldValue::Numeric(Some(v)) => Some(*v as i64),
        FieldValue::Double(v) => Some(*v as i64),
        FieldValue::Integer(v) => Some(*v as i64),
        FieldValue::Character(Some(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

// -- Tests -------------------------------------------------------------------
