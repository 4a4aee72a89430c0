// src/exports.rs

//! Grouping of exported bags by dataset
//!
//! An export root holds bag parents, each wrapping exactly one bag:
//!
//! ```text
//! <export root>/
//!   3f1c.../           <- bag parent (usually a UUID)
//!     <bag name>/      <- the bag
//!       bag-info.txt
//!       metadata/dataset.xml
//!       ...
//! ```
//!
//! A dataset has one or two bags. When there are two, the one declaring
//! `Is-Version-Of` is version 2; otherwise the earlier `Created` wins.

use crate::bag::BagInfo;
use crate::bag::info::{CREATED, IS_VERSION_OF};
use crate::error::{Error, Result};
use crate::metadata::DatasetXml;
use crate::metadata::dataset::DATASET_XML;
use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Maximum number of bag versions per dataset
pub const MAX_VERSIONS: usize = 2;

/// The single bag directory inside a bag parent
pub fn bag_dir(bag_parent: &Path) -> Result<PathBuf> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(bag_parent).map_err(|e| Error::io("Failed to list", bag_parent, e))? {
        let entry = entry.map_err(|e| Error::io("Failed to list", bag_parent, e))?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    match dirs.len() {
        1 => Ok(dirs.remove(0)),
        n => Err(Error::StructuralError(format!(
            "Expected exactly one bag directory in {}, found {}",
            bag_parent.display(),
            n
        ))),
    }
}

/// The bag parents of one dataset, version 1 first
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetGroup {
    dataset_id: String,
    bag_parents: Vec<PathBuf>,
}

impl DatasetGroup {
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn bag_parents(&self) -> &[PathBuf] {
        &self.bag_parents
    }

    pub fn version1(&self) -> &Path {
        &self.bag_parents[0]
    }

    pub fn version2(&self) -> Option<&Path> {
        self.bag_parents.get(1).map(PathBuf::as_path)
    }

    /// Number of versions, 1 or 2
    pub fn len(&self) -> usize {
        self.bag_parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bag_parents.is_empty()
    }
}

/// What ordering needs to know about a bag parent
struct Candidate {
    bag_parent: PathBuf,
    is_version_of: bool,
    created: Option<DateTime<FixedOffset>>,
}

impl Candidate {
    fn read(bag_parent: PathBuf, bag: &Path, info: &BagInfo) -> Result<Self> {
        let created = match info.get(CREATED) {
            Some(value) => Some(DateTime::parse_from_rfc3339(value.trim()).map_err(|e| {
                Error::MetadataError(format!(
                    "Invalid {} value '{}' in {}: {}",
                    CREATED,
                    value,
                    bag.display(),
                    e
                ))
            })?),
            None => None,
        };
        Ok(Self {
            bag_parent,
            is_version_of: info.has_value(IS_VERSION_OF),
            created,
        })
    }

    fn name(&self) -> &std::ffi::OsStr {
        self.bag_parent.file_name().unwrap_or_default()
    }
}

/// Datasets found in an export root
#[derive(Debug)]
pub struct ExportGrouper {
    root: PathBuf,
    groups: BTreeMap<String, DatasetGroup>,
}

impl ExportGrouper {
    /// Scan the bag parents directly under `root`
    pub fn scan(root: &Path) -> Result<Self> {
        info!("Scanning exports in {}", root.display());

        let mut bag_parents = Vec::new();
        for entry in fs::read_dir(root).map_err(|e| Error::io("Failed to list", root, e))? {
            let entry = entry.map_err(|e| Error::io("Failed to list", root, e))?;
            let path = entry.path();
            if path.is_dir() {
                bag_parents.push(path);
            } else {
                debug!("Ignoring {}, not a bag parent", path.display());
            }
        }
        bag_parents.sort();

        let mut candidates: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        for bag_parent in bag_parents {
            let bag = bag_dir(&bag_parent)?;
            let dataset_id = read_dataset_id(&bag)?;
            let info = BagInfo::read(&bag)?;
            let candidate = Candidate::read(bag_parent, &bag, &info)?;

            let versions = candidates.entry(dataset_id.clone()).or_default();
            if versions.len() >= MAX_VERSIONS {
                return Err(Error::StructuralError(format!(
                    "More than {} bags for dataset {}: {} and {}",
                    MAX_VERSIONS,
                    dataset_id,
                    versions
                        .iter()
                        .map(|c| c.bag_parent.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                    candidate.bag_parent.display()
                )));
            }
            debug!("{} belongs to dataset {}", candidate.bag_parent.display(), dataset_id);
            versions.push(candidate);
        }

        let mut groups = BTreeMap::new();
        for (dataset_id, versions) in candidates {
            let bag_parents = order_versions(&dataset_id, versions)?;
            groups.insert(
                dataset_id.clone(),
                DatasetGroup {
                    dataset_id,
                    bag_parents,
                },
            );
        }

        info!("Found {} datasets in {}", groups.len(), root.display());
        Ok(Self {
            root: root.to_path_buf(),
            groups,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset_ids(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn group(&self, dataset_id: &str) -> Option<&DatasetGroup> {
        self.groups.get(dataset_id)
    }

    /// Bag parents of a dataset, version 1 first; empty for an unknown id
    pub fn bag_parents_for(&self, dataset_id: &str) -> &[PathBuf] {
        self.groups
            .get(dataset_id)
            .map(|g| g.bag_parents())
            .unwrap_or_default()
    }

    pub fn groups(&self) -> impl Iterator<Item = &DatasetGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

fn read_dataset_id(bag: &Path) -> Result<String> {
    let path = bag.join(DATASET_XML);
    if !path.is_file() {
        return Err(Error::StructuralError(format!(
            "No {} found in {}",
            DATASET_XML,
            bag.display()
        )));
    }
    DatasetXml::from_file(&path)?
        .dataset_id()
        .map_err(|e| Error::StructuralError(format!("{}: {}", path.display(), e)))
}

fn order_versions(dataset_id: &str, mut versions: Vec<Candidate>) -> Result<Vec<PathBuf>> {
    if versions.len() == MAX_VERSIONS {
        if versions.iter().all(|c| c.is_version_of) {
            return Err(Error::StructuralError(format!(
                "Both bags of dataset {} declare {}",
                dataset_id, IS_VERSION_OF
            )));
        }
        versions.sort_by(|a, b| {
            a.is_version_of
                .cmp(&b.is_version_of)
                .then_with(|| match (a.created, b.created) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.name().cmp(b.name()))
        });
    }
    Ok(versions.into_iter().map(|c| c.bag_parent).collect())
}
