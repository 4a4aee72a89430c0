// src/commands.rs
//! Command handler for the avexports CLI

use anyhow::{Context, Result};
use avexports::{Config, ConversionEngine, ConversionOptions, SourceMap, fsutil};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Where a run reads its bag parents from
fn prepare_input(input_dir: &Path, staging_dir: &Path, move_input: bool) -> Result<()> {
    if move_input {
        info!("Processing {} in place", input_dir.display());
        return Ok(());
    }

    if staging_dir.exists() {
        fs::remove_dir_all(staging_dir)
            .with_context(|| format!("Failed to clear staging directory {}", staging_dir.display()))?;
    }
    info!("Copying {} to {}", input_dir.display(), staging_dir.display());
    fsutil::copy_dir_all(input_dir, staging_dir)
        .with_context(|| format!("Failed to stage {}", input_dir.display()))?;
    Ok(())
}

/// Convert all exports in `input_dir`; returns false if any dataset failed
pub fn cmd_convert(
    input_dir: &Path,
    output_dir: &Path,
    config_path: &Path,
    move_input: bool,
    fail_fast: bool,
) -> Result<bool> {
    let config = Config::from_file(config_path)
        .with_context(|| format!("Failed to load configuration {}", config_path.display()))?;

    if !input_dir.is_dir() {
        anyhow::bail!("Input directory {} does not exist", input_dir.display());
    }

    let sources = SourceMap::from_file(&config.sources.csv, &config.sources.media_dir)?;
    let options = ConversionOptions {
        output_dir: output_dir.to_path_buf(),
        fail_fast,
        algorithms: config.algorithms()?,
    };

    prepare_input(input_dir, &config.staging_dir, move_input)?;
    let export_root = if move_input { input_dir } else { config.staging_dir.as_path() };

    let report = ConversionEngine::new(&sources, options).convert(export_root)?;

    println!("Converted {} datasets", report.converted.len());
    if !report.is_success() {
        println!("{} datasets failed:", report.failed.len());
        for (dataset_id, e) in &report.failed {
            warn!("Dataset {} was not converted", dataset_id);
            println!("  {}", e);
        }
    }
    Ok(report.is_success())
}
