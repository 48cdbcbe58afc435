//! Client for the USGS Network-Linked Data Index basin service.

use anyhow::{anyhow, Context, Result};
use geo::{Geometry, MultiPolygon, Polygon};
use geojson::GeoJson;
use reqwest::Client;
use tracing::{debug, info};

use crate::{basin::Basin, cli::create_progress_bar, crs::Crs};

pub const DEFAULT_NLDI_URL: &str = "https://labs.waterdata.usgs.gov/api/nldi";

pub struct NldiClient {
    client: Client,
    base_url: String,
}

impl NldiClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        NldiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn basin_url(&self, gauge_id: &str) -> String {
        format!("{}/linked-data/nwissite/USGS-{}/basin", self.base_url, gauge_id)
    }

    pub async fn get_basin(&self, gauge_id: &str) -> Result<Basin> {
        let url = self.basin_url(gauge_id);
        let response = self
            .client
            .get(&url)
            .query(&[("simplified", "true"), ("splitCatchment", "false")])
            .send()
            .await
            .with_context(|| format!("Failed to request `{}`", url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "NLDI returned {} for basin `{}`",
                response.status(),
                gauge_id
            ));
        }

        let body = response.text().await?;
        debug!(gauge_id, bytes = body.len(), "received basin");

        parse_basin(gauge_id, &body)
    }

    /// Fetches basins one at a time, in the order given.
    pub async fn get_basins(&self, gauge_ids: &[String]) -> Result<Vec<Basin>> {
        info!(count = gauge_ids.len(), url = %self.base_url, "requesting basins from NLDI");
        let pb = create_progress_bar(gauge_ids.len() as u64, "Downloading basins...".to_string());
        let mut basins = Vec::with_capacity(gauge_ids.len());

        for gauge_id in gauge_ids {
            basins.push(self.get_basin(gauge_id).await?);
            pb.inc(1);
        }
        pb.finish_with_message("Basins downloaded");

        Ok(basins)
    }
}

/// Collects every polygon of an NLDI GeoJSON response into one basin.
pub fn parse_basin(gauge_id: &str, body: &str) -> Result<Basin> {
    let geojson: GeoJson = body
        .parse()
        .with_context(|| format!("Invalid GeoJSON for basin `{}`", gauge_id))?;

    let geometries: Vec<geojson::Geometry> = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().filter_map(|f| f.geometry).collect(),
        GeoJson::Feature(f) => f.geometry.into_iter().collect(),
        GeoJson::Geometry(g) => vec![g],
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        let geometry = Geometry::<f64>::try_from(geometry)?;
        polygons.extend(only_polygons(geometry));
    }

    if polygons.is_empty() {
        return Err(anyhow!("NLDI response for basin `{}` has no polygon", gauge_id));
    }

    Ok(Basin {
        identifier: gauge_id.to_string(),
        geometry: MultiPolygon(polygons),
        crs: Crs::wgs84(),
    })
}

fn only_polygons(geometry: Geometry<f64>) -> Vec<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => vec![p],
        Geometry::MultiPolygon(mp) => mp.0,
        Geometry::GeometryCollection(gc) => gc.0.into_iter().flat_map(only_polygons).collect(),
        _ => vec![],
    }
}

// -- Tests -------------------------------------------------------------------
