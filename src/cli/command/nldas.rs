use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, Local};
use tracing::{info, warn};

use crate::{config::Settings, download::fetch_url_list};

const NLDAS_TAG: &str = "NLDAS";
const FIRST_NLDAS_YEAR: i32 = 1979;

/// Downloads every NLDAS URL list found in the project into the dataset
/// directory for `year`.
pub async fn nldas_hourly(settings: &Settings, year: i32) -> Result<PathBuf> {
    check_year(year, Local::now().year())?;

    let list_dir = settings.nldas_list_dir();
    let save_dir = nldas_save_dir(&settings.dataset_dir, year);
    let url_lists = select_url_lists(&list_dir, NLDAS_TAG)?;
    if url_lists.is_empty() {
        warn!(dir = %list_dir.display(), tag = NLDAS_TAG, "no URL lists to download");
    }

    let client = settings.http_client()?;
    for url_list in &url_lists {
        let summary = fetch_url_list(&client, url_list, &save_dir, settings.earthdata.as_ref()).await?;
        info!(
            url_list = %url_list.display(),
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            "URL list done"
        );
    }

    Ok(save_dir)
}

pub fn nldas_save_dir(dataset_dir: &Path, year: i32) -> PathBuf {
    dataset_dir.join("nldas_hourly").join(year.to_string())
}

/// Text files in `dir` whose name contains `tag`, sorted by name.
pub fn select_url_lists(dir: &Path, tag: &str) -> Result<Vec<PathBuf>> {
    let mut url_lists = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read `{}`", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.contains(tag) && name.ends_with(".txt") {
            url_lists.push(path);
        }
    }
    url_lists.sort();

    Ok(url_lists)
}

fn check_year(year: i32, current_year: i32) -> Result<()> {
    if !(FIRST_NLDAS_YEAR..=current_year).contains(&year) {
        return Err(anyhow!(
            "NLDAS hourly data covers {} to {}, got {}",
            FIRST_NLDAS_YEAR,
            current_year,
            year
        ));
    }

    Ok(())
}

// -- Tests -------------------------------------------------------------------
