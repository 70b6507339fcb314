//! `simc` CLI: run a clutter simulation from a configuration file.

use anyhow::{Context, Result};
use clap::Parser;
use simclutter::{ClutterConfig, PathOverrides};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "simc", about = "Run a clutter simulation.")]
struct Cli {
    /// Path to configuration file (.toml)
    conf_path: PathBuf,
    /// Path to navigation file - overrides any path in config file
    #[arg(short = 'n', value_name = "NAV_PATH")]
    nav_path: Option<PathBuf>,
    /// Path to DEM file - overrides any path in config file
    #[arg(short = 'd', value_name = "DEM_PATH")]
    dem_path: Option<PathBuf>,
    /// Path to output products - overrides any path in config file
    #[arg(short = 'o', value_name = "OUT_PATH")]
    out_path: Option<PathBuf>,
    /// Display progress
    #[arg(short = 'p')]
    progress: bool,
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    Ok(std::env::current_dir()?.join(path))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let overrides = PathOverrides {
        navpath: cli.nav_path.map(absolute).transpose()?,
        dempath: cli.dem_path.map(absolute).transpose()?,
        outpath: cli.out_path.map(absolute).transpose()?,
    };
    let conf_path = absolute(cli.conf_path)?;

    let config = ClutterConfig::load(&conf_path, &overrides)
        .with_context(|| format!("Unable to load configuration {}", conf_path.display()))?;

    let summary = simclutter::run(&config, cli.progress).context("Clutter simulation failed")?;

    log::info!(
        "Done: {} rows ({} unique), {} facets, {} points without terrain",
        summary.rows,
        summary.unique_points,
        summary.facet_count,
        summary.empty_points
    );
    for path in &summary.artifacts {
        log::info!("Wrote {}", path.display());
    }
    Ok(())
}
