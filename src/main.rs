// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let success = commands::cmd_convert(
        &cli.input_dir,
        &cli.output_dir,
        &cli.config,
        cli.move_input,
        cli.fail_fast,
    )?;

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
