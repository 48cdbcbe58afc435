//! Flattens grid cells into a (lat, lon, value) table and saves it as CSV or
//! _parquet_ for loading into a GIS.

use std::{
    collections::HashMap,
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use clap::ValueEnum;
use ndarray::ArrayView2;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};

use crate::grid::{Bounds, Grid, MaskedGrid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
        }
    }
}

/// Complete (lat, lon, value) rows of one variable's first time step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellTable {
    pub variable: String,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub values: Vec<f64>,
    pub metadata: HashMap<String, String>,
}

impl CellTable {
    pub fn from_grid(grid: &Grid, variable: &str) -> Result<Self> {
        let values = grid.first_slice(variable)?;

        Ok(flatten_columns(variable, grid.lat.view(), grid.lon.view(), values))
    }

    /// Same as [`CellTable::from_grid`], recording the transform and polygon
    /// bounds the grid was masked with.
    pub fn from_masked(masked: &MaskedGrid, variable: &str) -> Result<Self> {
        let mut table = CellTable::from_grid(&masked.grid, variable)?;
        table.metadata.insert(
            "transform".to_string(),
            serde_json::to_string(&masked.transform.coefficients())?,
        );
        table
            .metadata
            .insert("bounds".to_string(), serde_json::to_string(&masked.bounds)?);

        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Extent of the rows, `None` for an empty table.
    pub fn extent(&self) -> Option<Bounds> {
        if self.is_empty() {
            return None;
        }
        let fold = |v: &[f64]| {
            v.iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
        };
        let (south, north) = fold(&self.lat);
        let (west, east) = fold(&self.lon);

        Some(Bounds {
            west,
            south,
            east,
            north,
        })
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = Arc::new(
            Schema::new(vec![
                Field::new("lat", DataType::Float64, false),
                Field::new("lon", DataType::Float64, false),
                Field::new(self.variable.as_str(), DataType::Float64, false),
            ])
            .with_metadata(self.metadata.clone()),
        );

        let columns: Vec<ArrayRef> = vec![
            Arc::new(Float64Array::from(self.lat.clone())),
            Arc::new(Float64Array::from(self.lon.clone())),
            Arc::new(Float64Array::from(self.values.clone())),
        ];

        Ok(RecordBatch::try_new(schema, columns)?)
    }

    /// Saves to `<dir>/<stem>.<csv|parquet>` and returns the path written.
    pub fn save(&self, dir: &Path, stem: &str, format: ExportFormat) -> Result<PathBuf> {
        let file_path = dir.join(format!("{}.{}", stem, format.extension()));
        let batch = self.to_record_batch()?;
        let file = File::create(&file_path)
            .with_context(|| format!("Failed to create `{}`", file_path.display()))?;

        match format {
            ExportFormat::Csv => {
                let mut writer = arrow::csv::WriterBuilder::new()
                    .with_header(true)
                    .build(file);
                writer.write(&batch)?;
            }
            ExportFormat::Parquet => {
                let props = WriterProperties::builder()
                    .set_compression(Compression::SNAPPY)
                    .build();
                let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
                writer.write(&batch)?;
                writer.close()?;
            }
        }

        Ok(file_path)
    }
}

/// Flattens three same-shaped planes row-major and drops every row with a
/// NaN in any column.
pub fn flatten_columns(
    variable: &str,
    lat: ArrayView2<f64>,
    lon: ArrayView2<f64>,
    values: ArrayView2<f64>,
) -> CellTable {
    let mut table = CellTable {
        variable: variable.to_string(),
        ..CellTable::default()
    };

    for ((&la, &lo), &v) in lat.iter().zip(lon.iter()).zip(values.iter()) {
        if la.is_nan() || lo.is_nan() || v.is_nan() {
            continue;
        }
        table.lat.push(la);
        table.lon.push(lo);
        table.values.push(v);
    }

    table
}

// -- Tests -------------------------------------------------------------------
