//! BarSync CLI — partition-and-sync pipeline for daily bars.
//!
//! Commands:
//! - `sync` — fetch bars, partition by year/month, write CSVs, mirror to S3
//! - `crawl` — reconcile the catalog database + crawler and wait for the run
//! - `run` — sync followed by crawl

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use barsync_cloud::catalog::StdoutCrawlProgress;
use barsync_cloud::glue::GlueCatalog;
use barsync_cloud::mirror::StdoutProgress;
use barsync_cloud::pipeline::{run_crawl, run_sync};
use barsync_cloud::s3::S3Store;
use barsync_core::config::PipelineConfig;
use barsync_core::data::BinanceProvider;

#[derive(Parser)]
#[command(
    name = "barsync",
    about = "BarSync CLI — fetch daily bars, partition by year/month, mirror to S3, crawl"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch bars, partition by year/month, write CSVs, mirror to object storage.
    Sync {
        /// Path to the pipeline TOML config.
        #[arg(long, default_value = "barsync.toml")]
        config: PathBuf,
    },
    /// Ensure the catalog database and crawler exist, start the crawler, and wait.
    Crawl {
        /// Path to the pipeline TOML config.
        #[arg(long, default_value = "barsync.toml")]
        config: PathBuf,
    },
    /// Sync, then crawl.
    Run {
        /// Path to the pipeline TOML config.
        #[arg(long, default_value = "barsync.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { config } => cmd_sync(&config),
        Commands::Crawl { config } => cmd_crawl(&config),
        Commands::Run { config } => {
            cmd_sync(&config)?;
            cmd_crawl(&config)
        }
    }
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::from_file(path)
        .with_context(|| format!("loading config from {}", path.display()))
}

fn cmd_sync(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let provider = BinanceProvider::new();
    let store = S3Store::from_env(config.region.clone())?;

    let report = run_sync(&config, &provider, &store, &StdoutProgress)?;

    println!(
        "CSV files written: {} (base: {})",
        report.files_written,
        config.output_dir.display()
    );
    println!(
        "Uploaded {} object(s) to s3://{}/{}",
        report.objects_uploaded, config.bucket, config.key_prefix
    );
    Ok(())
}

fn cmd_crawl(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let catalog = GlueCatalog::from_env(config.region.clone())?;

    // The outcome (including a FAILED crawl) is reported by the progress
    // lines; only transport errors and the poll timeout exit non-zero.
    run_crawl(&config, &catalog, &StdoutCrawlProgress)?;
    Ok(())
}
