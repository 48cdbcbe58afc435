use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use tracing::info;

use crate::{
    basin::write_basins,
    camels::CamelsCatalog,
    cli::Stopwatch,
    config::Settings,
    nldi::NldiClient,
};

const NLDI_SHP_FILE: &str = "nldi_camels_671_basins.shp";
const NLDI_ESTIMATE: Duration = Duration::from_secs(1000);

/// Fetches the NLDI boundary of every CAMELS basin and saves them as one
/// shapefile.
pub async fn nldi(settings: &Settings) -> Result<PathBuf> {
    let catalog = CamelsCatalog::open(&settings.camels_dir())?;
    let gauge_ids = catalog.gauge_ids();
    info!(basins = catalog.sites().len(), "loaded CAMELS catalog");

    let client = NldiClient::new(settings.http_client()?, &settings.nldi_url);
    let stopwatch = Stopwatch::start("Fetching NLDI basins", NLDI_ESTIMATE);
    let basins = client.get_basins(&gauge_ids).await?;
    stopwatch.finish();

    let shp_path = nldi_save_path(&settings.nldi_basins_dir());
    if let Some(dir) = shp_path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create `{}`", dir.display()))?;
    }
    write_basins(&basins, &shp_path)?;

    Ok(shp_path)
}

pub fn nldi_save_path(dir: &Path) -> PathBuf {
    dir.join(NLDI_SHP_FILE)
}

// -- Tests -------------------------------------------------------------------
