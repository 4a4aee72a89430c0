// src/config.rs
//! Configuration file parsing
//!
//! TOML with the following sections:
//! - [sources] - the source mapping CSV and the media root its paths are relative to
//! - staging_dir - where input is copied when it is not moved
//! - [bag] - accepted manifest algorithms
//!
//! ```toml
//! staging_dir = "/var/tmp/avexports/staging"
//!
//! [sources]
//! csv = "/etc/avexports/sources.csv"
//! media_dir = "/data/springfield"
//!
//! [bag]
//! algorithms = ["md5", "sha1"]
//! ```

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Location of the configuration file when none is given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/avexports/config.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
    /// Source mapping settings
    pub sources: SourcesSection,

    /// Copy target for the input tree when not moving it
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Bag settings
    #[serde(default)]
    pub bag: BagSection,
}

/// Source mapping configuration section
#[derive(Debug, Deserialize)]
pub struct SourcesSection {
    /// CSV mapping file ids to real assets
    pub csv: PathBuf,

    /// Root directory of the asset paths in the CSV
    pub media_dir: PathBuf,
}

/// Bag configuration section
#[derive(Debug, Deserialize)]
pub struct BagSection {
    /// Manifest algorithms a bag may use
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<String>,
}

impl Default for BagSection {
    fn default() -> Self {
        Self {
            algorithms: default_algorithms(),
        }
    }
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("/var/tmp/avexports/staging")
}

fn default_algorithms() -> Vec<String> {
    HashAlgorithm::ALL.iter().map(|a| a.name().to_string()).collect()
}

impl Config {
    /// Load and validate a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sources.csv.as_os_str().is_empty() {
            return Err(Error::ConfigError("sources.csv must not be empty".to_string()));
        }
        if self.sources.media_dir.as_os_str().is_empty() {
            return Err(Error::ConfigError("sources.media_dir must not be empty".to_string()));
        }
        if self.staging_dir.as_os_str().is_empty() {
            return Err(Error::ConfigError("staging_dir must not be empty".to_string()));
        }
        if self.bag.algorithms.is_empty() {
            return Err(Error::ConfigError(
                "bag.algorithms must name at least one algorithm".to_string(),
            ));
        }
        self.algorithms()?;
        Ok(())
    }

    /// The accepted manifest algorithms, sorted and without duplicates
    pub fn algorithms(&self) -> Result<Vec<HashAlgorithm>> {
        let mut algorithms = self
            .bag
            .algorithms
            .iter()
            .map(|name| {
                name.parse::<HashAlgorithm>()
                    .map_err(|e| Error::ConfigError(format!("bag.algorithms: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;
        algorithms.sort();
        algorithms.dedup();
        Ok(algorithms)
    }
}
