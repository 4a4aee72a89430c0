// src/cli.rs
//! CLI definitions for avexports
//!
//! The command implementation is in the `commands` module.

use avexports::DEFAULT_CONFIG_PATH;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "avexports")]
#[command(version)]
#[command(about = "Replace AV placeholders in exported bags with the real media files", long_about = None)]
pub struct Cli {
    /// Directory holding the exported bag parents
    pub input_dir: PathBuf,

    /// Directory the converted bag parents are moved to (must be empty or absent)
    pub output_dir: PathBuf,

    /// Process the input directory in place instead of a staging copy
    #[arg(short, long = "move")]
    pub move_input: bool,

    /// Stop at the first dataset that fails
    #[arg(short, long)]
    pub fail_fast: bool,

    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}
