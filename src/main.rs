//! # bikeshop_forecast
//!
//! Command-line entry point: load the bikeshop tables, aggregate monthly
//! revenue per category and forecast it.

use anyhow::{Context, Result};
use clap::Parser;
use sales_forecast::config::SourceKind;
use sales_forecast::PipelineConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bikeshop_forecast")]
#[command(about = "Monthly bikeshop sales forecasting", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Directory of bikes.csv, bikeshops.csv and orderlines.csv instead of a database
    #[arg(long, conflicts_with = "database")]
    csv_dir: Option<PathBuf>,

    /// Number of months to forecast
    #[arg(long)]
    horizon: Option<usize>,

    /// Worker threads used for fitting
    #[arg(short = 'j', long)]
    n_jobs: Option<usize>,

    /// Checkpoint file for fitted models
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Forecast from the saved checkpoint instead of fitting
    #[arg(long)]
    reuse_checkpoint: bool,

    /// Directory for CSV exports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(path) = self.database {
            config.data.source = SourceKind::Sqlite;
            config.data.path = path;
        }
        if let Some(dir) = self.csv_dir {
            config.data.source = SourceKind::Csv;
            config.data.path = dir;
        }
        if let Some(horizon) = self.horizon {
            config.forecast.horizon = horizon;
        }
        if let Some(n_jobs) = self.n_jobs {
            config.forecast.n_jobs = n_jobs;
        }
        if let Some(path) = self.checkpoint {
            config.forecast.checkpoint = path;
        }
        if self.reuse_checkpoint {
            config.forecast.reuse_checkpoint = true;
        }
        if self.output_dir.is_some() {
            config.output.dir = self.output_dir;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bikeshop_forecast=info,sales_forecast=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Cli::parse().into_config()?;
    tracing::info!(
        source = ?config.data.source,
        path = %config.data.path.display(),
        horizon = config.forecast.horizon,
        "Starting {} {}",
        sales_forecast::NAME,
        sales_forecast::VERSION
    );

    let output = sales_forecast::run(&config).context("Forecast pipeline failed")?;
    tracing::info!(
        records = output.records.len(),
        series = output.series.len(),
        forecasts = output.forecasts.len(),
        "Pipeline finished"
    );

    let table = output
        .forecasts
        .to_dataframe()
        .context("Failed to tabulate forecasts")?;
    println!("{}", table);
    Ok(())
}
