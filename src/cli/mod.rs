//! Command line interface.

pub mod command;

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use clap::{command, Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{export::ExportFormat, nldi::DEFAULT_NLDI_URL};

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Project directory holding `hydrobench/` URL lists and `test/test_data`
    #[arg(long, global = true, env = "HYDROFETCH_ROOT_DIR")]
    pub root_dir: Option<PathBuf>,

    /// Dataset directory [default: ~/data]
    #[arg(long, global = true, env = "HYDROFETCH_DATASET_DIR")]
    pub dataset_dir: Option<PathBuf>,

    /// Base URL of the NLDI service
    #[arg(long, global = true, env = "HYDROFETCH_NLDI_URL", default_value = DEFAULT_NLDI_URL)]
    pub nldi_url: String,

    /// HTTP request timeout in seconds [default: none]
    #[arg(long, global = true, env = "HYDROFETCH_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Earthdata login user name
    #[arg(long, global = true, env = "EARTHDATA_USERNAME")]
    pub earthdata_username: Option<String>,

    /// Earthdata login password
    #[arg(long, global = true, env = "EARTHDATA_PASSWORD", hide_env_values = true)]
    pub earthdata_password: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download NLDAS hourly forcing files listed in the URL lists
    NldasHourly {
        #[arg(long, default_value_t = 2014)]
        year: i32,
    },
    /// Download NLDI boundaries of every CAMELS basin into one shapefile
    Nldi {},
    /// Check how a basin polygon masks a gridded dataset
    Inspect {
        #[command(subcommand)]
        check: InspectCommand,
    },
}

#[derive(Subcommand)]
pub enum InspectCommand {
    /// Export the first time step of a variable for viewing in a GIS
    Export(InspectArgs),
    /// Compare the basin bounds with the extent of the data
    Footprint(InspectArgs),
    /// Mask the grid with the basin polygon and its bounding rectangle
    Mask(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// CAMELS gauge id
    #[arg(long, default_value = "01013500")]
    pub basin: String,

    /// Variable to export
    #[arg(long = "var", default_value = "prcp")]
    pub variable: String,

    /// NetCDF file to read [default: <root-dir>/test/test_data/<basin>_2000_01_01-03_*.nc]
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
    pub format: ExportFormat,
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    let style = ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

    ProgressBar::new(size).with_message(message).with_style(style)
}

/// Wall-clock timing of one long step.
pub struct Stopwatch {
    label: String,
    started: Instant,
}

impl Stopwatch {
    /// Starts timing; `hint` is the rough expected duration shown to the user.
    pub fn start(label: &str, hint: Duration) -> Self {
        println!("{} (usually takes about {}s)", label, hint.as_secs());

        Stopwatch {
            label: label.to_string(),
            started: Instant::now(),
        }
    }

    /// Prints the elapsed time and returns it.
    pub fn finish(self) -> Duration {
        let elapsed = self.started.elapsed();
        println!("{} took {:.1}s", self.label, elapsed.as_secs_f64());

        elapsed
    }
}

// -- Tests -------------------------------------------------------------------
