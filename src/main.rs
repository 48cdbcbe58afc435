mod basin;
mod camels;
mod cli;
mod config;
mod crs;
mod download;
mod error;
mod export;
mod grid;
mod nldi;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands, InspectCommand};
use config::Settings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_args(&cli.global)?;

    match &cli.command {
        Commands::NldasHourly { year } => {
            let save_dir = command::nldas_hourly(&settings, *year).await?;
            println!("Files saved to `{}`", save_dir.display());
            println!("Downloading NLDAS hourly data is finished!");
        }
        Commands::Nldi {} => {
            let filename = command::nldi(&settings).await?;
            println!("File saved to `{}`", filename.display());
        }
        Commands::Inspect { check } => match check {
            InspectCommand::Export(args) => {
                let filename = command::inspect_export(&settings, args)?;
                println!("File saved to `{}`", filename.display());
            }
            InspectCommand::Footprint(args) => {
                let comparison = command::inspect_footprint(&settings, args)?;
                println!("{}", comparison);
                println!("Basin inside data extent: {}", comparison.covers());
            }
            InspectCommand::Mask(args) => {
                for filename in command::inspect_mask(&settings, args)? {
                    println!("File saved to `{}`", filename.display());
                }
            }
        },
    }

    Ok(())
}
