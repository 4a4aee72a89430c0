// src/sources.rs

//! The source mapping file (`sources.csv`)
//!
//! Maps EASY file ids to the real AV asset that replaces their placeholder,
//! and datasets to the file ids that need replacing:
//!
//! ```text
//! easy_file_id,easy_dataset_id,path_in_springfield_dir
//! easy-file:1,easy-dataset:1,domain/dans/user/u1/video/12/rawvideo/2/interview.mp4
//! ```
//!
//! Asset paths are relative to the media directory. Nothing here checks that
//! a file id exists in any bag; that surfaces during conversion.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct SourceRow {
    easy_file_id: String,
    easy_dataset_id: String,
    path_in_springfield_dir: String,
}

#[derive(Debug, Default)]
pub struct SourceMap {
    file_to_asset: HashMap<String, PathBuf>,
    dataset_to_files: HashMap<String, BTreeSet<String>>,
}

impl SourceMap {
    /// Read the mapping from a CSV file with a header row
    pub fn from_file(csv_path: &Path, media_dir: &Path) -> Result<Self> {
        info!("Reading sources from {}", csv_path.display());
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(csv_path)
            .map_err(|e| Error::IoError(format!("Failed to open {}: {}", csv_path.display(), e)))?;
        let sources = Self::from_csv(reader, media_dir)
            .map_err(|e| Error::ParseError(format!("{}: {}", csv_path.display(), e)))?;
        info!("Read {} file mappings from {}", sources.file_to_asset.len(), csv_path.display());
        Ok(sources)
    }

    /// Read the mapping from any reader, for in-memory sources
    pub fn from_reader<R: Read>(reader: R, media_dir: &Path) -> Result<Self> {
        let reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        Self::from_csv(reader, media_dir).map_err(|e| Error::ParseError(e.to_string()))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>, media_dir: &Path) -> csv::Result<Self> {
        let mut sources = Self::default();
        for row in reader.deserialize::<SourceRow>() {
            let row = row?;
            let asset = media_dir.join(&row.path_in_springfield_dir);
            if let Some(previous) = sources.file_to_asset.insert(row.easy_file_id.clone(), asset) {
                warn!(
                    "File id {} mapped more than once, replacing {}",
                    row.easy_file_id,
                    previous.display()
                );
            }
            sources
                .dataset_to_files
                .entry(row.easy_dataset_id)
                .or_default()
                .insert(row.easy_file_id);
        }
        Ok(sources)
    }

    pub fn has_substitutions(&self, dataset_id: &str) -> bool {
        self.dataset_to_files.contains_key(dataset_id)
    }

    /// File ids to substitute for a dataset, sorted; empty if there are none
    pub fn file_ids_for(&self, dataset_id: &str) -> Vec<String> {
        self.dataset_to_files
            .get(dataset_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Absolute path of the real asset for a file id
    pub fn asset_path_for(&self, file_id: &str) -> Result<&Path> {
        self.file_to_asset
            .get(file_id)
            .map(PathBuf::as_path)
            .ok_or_else(|| Error::NotFoundError(format!("No source asset for file id {}", file_id)))
    }

    /// Number of mapped file ids
    pub fn len(&self) -> usize {
        self.file_to_asset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_to_asset.is_empty()
    }
}
