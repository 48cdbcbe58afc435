//! CAMELS-US basin catalog.
//!
//! Reads the gauge list from `camels_attributes_v2.0/camels_name.txt` and the
//! basin polygons from `basin_set_full_res/HCDN_nhru_final_671.shp`.

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::{
    basin::{self, Basin},
    crs::Crs,
};

const NAME_FILE: &str = "camels_attributes_v2.0/camels_name.txt";
const BASINS_SHP_FILE: &str = "basin_set_full_res/HCDN_nhru_final_671.shp";
const BASIN_KEY_FIELD: &str = "hru_id";

/// One row of the CAMELS name table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Site {
    pub gauge_id: String,
    pub huc_02: String,
    pub gauge_name: String,
}

#[derive(Debug, Clone)]
pub struct CamelsCatalog {
    root: PathBuf,
    sites: Vec<Site>,
}

impl CamelsCatalog {
    pub fn open(root: &Path) -> Result<Self> {
        let name_file = root.join(NAME_FILE);
        let file = File::open(&name_file)
            .with_context(|| format!("Failed to open CAMELS name table `{}`", name_file.display()))?;
        let sites = read_sites(file)
            .with_context(|| format!("Failed to parse `{}`", name_file.display()))?;

        Ok(CamelsCatalog {
            root: root.to_path_buf(),
            sites,
        })
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Gauge ids in catalog order.
    pub fn gauge_ids(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.gauge_id.clone()).collect()
    }

    pub fn contains(&self, gauge_id: &str) -> bool {
        self.sites.iter().any(|s| s.gauge_id == gauge_id)
    }

    pub fn basins_shp_file(&self) -> PathBuf {
        self.root.join(BASINS_SHP_FILE)
    }

    /// The polygon of one basin in the CRS of the CAMELS shapefile.
    pub fn basin(&self, gauge_id: &str) -> Result<Basin> {
        if !self.contains(gauge_id) {
            return Err(anyhow!("Basin `{}` is not in the CAMELS catalog", gauge_id));
        }
        let key: i64 = gauge_id
            .parse()
            .with_context(|| format!("Basin id `{}` is not numeric", gauge_id))?;

        let shp_file = self.basins_shp_file();
        let geometry = basin::read_polygon(&shp_file, BASIN_KEY_FIELD, key)?
            .ok_or_else(|| anyhow!("Basin `{}` not found in `{}`", gauge_id, shp_file.display()))?;
        let crs = basin::read_prj(&shp_file)?.unwrap_or_else(Crs::nad83);

        Ok(Basin {
            identifier: gauge_id.to_string(),
            geometry,
            crs,
        })
    }
}

fn read_sites<R: io::Read>(reader: R) -> Result<Vec<Site>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut sites = Vec::new();
    for result in reader.deserialize() {
        let site: Site = result?;
        sites.push(site);
    }

    Ok(sites)
}

// -- Tests -------------------------------------------------------------------
