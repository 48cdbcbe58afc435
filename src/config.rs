//! Run-time settings, resolved once from the global command line options.

use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use tracing::debug;

use crate::{
    cli::GlobalArgs,
    download::{client_builder, EARTHDATA_LOGIN_HOST},
};

const NLDAS_LIST_DIR: &str = "hydrobench/nldas4basins";
const CAMELS_DIR: &str = "camels/camels_us";
const NLDI_BASINS_DIR: &str = "daymet4camels/nldi_camels_671_basins";
const TEST_DATA_DIR: &str = "test/test_data";

/// Earthdata login, sent as basic auth to the Earthdata login host.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Project directory holding the URL lists and test data.
    pub root_dir: PathBuf,
    /// Where datasets are read from and downloaded to.
    pub dataset_dir: PathBuf,
    pub nldi_url: String,
    pub timeout: Option<Duration>,
    pub earthdata: Option<Credentials>,
}

impl Settings {
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let root_dir = match &args.root_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Cannot resolve the current directory")?,
        };
        let dataset_dir = match &args.dataset_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .ok_or_else(|| anyhow!("Cannot find a home directory, pass --dataset-dir"))?
                .join("data"),
        };
        let earthdata = match (&args.earthdata_username, &args.earthdata_password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        let settings = Settings {
            root_dir,
            dataset_dir,
            nldi_url: args.nldi_url.clone(),
            timeout: args.timeout_secs.map(Duration::from_secs),
            earthdata,
        };
        debug!(?settings, "resolved settings");

        Ok(settings)
    }

    pub fn nldas_list_dir(&self) -> PathBuf {
        self.root_dir.join(NLDAS_LIST_DIR)
    }

    pub fn camels_dir(&self) -> PathBuf {
        self.dataset_dir.join(CAMELS_DIR)
    }

    pub fn nldi_basins_dir(&self) -> PathBuf {
        self.dataset_dir.join(NLDI_BASINS_DIR)
    }

    pub fn test_data_dir(&self) -> PathBuf {
        self.root_dir.join(TEST_DATA_DIR)
    }

    /// HTTP client shared by the download commands.
    pub fn http_client(&self) -> Result<Client> {
        let mut builder = client_builder(EARTHDATA_LOGIN_HOST).user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        builder.build().context("Failed to build HTTP client")
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use std::path::Path;

    use super::*;
    use crate::nldi::DEFAULT_NLDI_URL;

    /// Settings rooted at `dir` for both the project and the datasets.
    pub(crate) fn settings_fixture(dir: &Path) -> Settings {
        Settings {
            root_dir: dir.to_path_buf(),
            dataset_dir: dir.join("data"),
            nldi_url: DEFAULT_NLDI_URL.to_string(),
            timeout: None,
            earthdata: None,
        }
    }

    fn args() -> GlobalArgs {
        GlobalArgs {
            root_dir: Some(PathBuf::from("/work/hydro")),
            dataset_dir: Some(PathBuf::from("/mnt/data")),
            nldi_url: DEFAULT_NLDI_URL.to_string(),
            timeout_secs: None,
            earthdata_username: None,
            earthdata_password: None,
        }
    }

    #[test]
    fn should_derive_paths_from_roots() {
        let settings = Settings::from_args(&args()).unwrap();

        assert_eq!(settings.nldas_list_dir(), PathBuf::from("/work/hydro/hydrobench/nldas4basins"));
        assert_eq!(settings.test_data_dir(), PathBuf::from("/work/hydro/test/test_data"));
        assert_eq!(settings.camels_dir(), PathBuf::from("/mnt/data/camels/camels_us"));
        assert_eq!(
            settings.nldi_basins_dir(),
            PathBuf::from("/mnt/data/daymet4camels/nldi_camels_671_basins")
        );
    }

    #[test]
    fn should_need_both_earthdata_values() {
        let mut args = args();
        args.earthdata_username = Some("hydro".to_string());
        assert_eq!(Settings::from_args(&args).unwrap().earthdata, None);

        args.earthdata_password = Some("secret".to_string());
        args.timeout_secs = Some(30);
        let settings = Settings::from_args(&args).unwrap();

        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.earthdata.as_ref().unwrap().username, "hydro");
        assert!(!format!("{:?}", settings).contains("secret"));
    }

    #[test]
    fn should_build_client_with_timeout() {
        let mut settings = Settings::from_args(&args()).unwrap();
        settings.timeout = Some(Duration::from_secs(5));

        assert!(settings.http_client().is_ok());
    }
}
