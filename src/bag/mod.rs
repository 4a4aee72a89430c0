// src/bag/mod.rs

//! Exported bags and their integrity manifests
//!
//! A [`Bag`] holds every manifest of one bag directory in memory. Edits go
//! through the manifest operations below and only reach disk on
//! [`Bag::commit`]. After a batch of payload edits the caller must, in this
//! order:
//!
//! 1. refresh the tag entries of every edited tag file
//!    ([`Bag::upsert_tag_entries`]),
//! 2. re-hash the payload manifests into the tag manifests
//!    ([`Bag::sync_manifest_of_manifests`]),
//! 3. [`Bag::commit`].
//!
//! Syncing before the last payload edit leaves stale payload manifest
//! checksums in the tag manifests.

pub mod info;
pub mod manifest;

pub use info::BagInfo;
pub use manifest::{Manifest, ManifestKind};

use crate::error::{Error, Result};
use crate::hash::{self, HashAlgorithm};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directory holding the payload, relative to the bag root
pub const PAYLOAD_DIR: &str = "data";

pub struct Bag {
    root: PathBuf,
    payload_manifests: Vec<Manifest>,
    tag_manifests: Vec<Manifest>,
    info: BagInfo,
}

impl Bag {
    /// Read the manifests and `bag-info.txt` of the bag at `root`
    ///
    /// Only the algorithms in `allowed` are accepted; a manifest for any other
    /// algorithm makes the bag unusable.
    pub fn open(root: &Path, allowed: &[HashAlgorithm]) -> Result<Self> {
        let entries = fs::read_dir(root).map_err(|e| Error::io("Failed to list", root, e))?;

        let mut payload_manifests = Vec::new();
        let mut tag_manifests = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io("Failed to list", root, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some((kind, algorithm_name)) = manifest::parse_file_name(name) else {
                continue;
            };
            let algorithm = algorithm_name
                .parse::<HashAlgorithm>()
                .ok()
                .filter(|a| allowed.contains(a))
                .ok_or_else(|| {
                    Error::StructuralError(format!(
                        "Unsupported manifest algorithm '{}' in {}",
                        algorithm_name,
                        root.display()
                    ))
                })?;

            let manifest = Manifest::read(root, kind, algorithm)?;
            match kind {
                ManifestKind::Payload => payload_manifests.push(manifest),
                ManifestKind::Tag => tag_manifests.push(manifest),
            }
        }

        if payload_manifests.is_empty() {
            return Err(Error::StructuralError(format!(
                "No payload manifest found in {}",
                root.display()
            )));
        }
        payload_manifests.sort_by_key(Manifest::algorithm);
        tag_manifests.sort_by_key(Manifest::algorithm);

        let info = BagInfo::read(root)?;
        debug!(
            "Opened bag {} ({} payload manifests, {} tag manifests)",
            root.display(),
            payload_manifests.len(),
            tag_manifests.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            payload_manifests,
            tag_manifests,
            info,
        })
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Algorithms of the payload manifests
    pub fn algorithms(&self) -> Vec<HashAlgorithm> {
        self.payload_manifests.iter().map(Manifest::algorithm).collect()
    }

    pub fn payload_manifests(&self) -> &[Manifest] {
        &self.payload_manifests
    }

    pub fn tag_manifests(&self) -> &[Manifest] {
        &self.tag_manifests
    }

    pub fn info(&self) -> &BagInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut BagInfo {
        &mut self.info
    }

    /// Absolute path of a bag-relative path
    pub fn resolve(&self, local_path: &str) -> PathBuf {
        self.root.join(local_path)
    }

    /// Drop `path` from every payload manifest
    pub fn remove_payload_entry(&mut self, path: &str) {
        for manifest in &mut self.payload_manifests {
            manifest.remove(path);
        }
    }

    /// Hash the file now at `path` into every payload manifest
    pub fn upsert_payload_entry(&mut self, path: &str) -> Result<()> {
        let file = self.root.join(path);
        for manifest in &mut self.payload_manifests {
            let checksum = hash::hash_file(manifest.algorithm(), &file)
                .map_err(|e| Error::io("Failed to hash", &file, e))?;
            manifest.insert(path, checksum.value);
        }
        Ok(())
    }

    /// Hash the given tag files into every tag manifest
    pub fn upsert_tag_entries(&mut self, paths: &[&str]) -> Result<()> {
        for manifest in &mut self.tag_manifests {
            for path in paths {
                let file = self.root.join(path);
                let checksum = hash::hash_file(manifest.algorithm(), &file)
                    .map_err(|e| Error::io("Failed to hash", &file, e))?;
                manifest.insert(*path, checksum.value);
            }
        }
        Ok(())
    }

    /// Write the payload manifests and record their checksums in every tag
    /// manifest
    pub fn sync_manifest_of_manifests(&mut self) -> Result<()> {
        let mut names = Vec::with_capacity(self.payload_manifests.len());
        for manifest in &self.payload_manifests {
            manifest.write(&self.root)?;
            names.push(manifest.file_name());
        }
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.upsert_tag_entries(&names)
    }

    /// Write all manifests to disk
    pub fn commit(&self) -> Result<()> {
        for manifest in self.payload_manifests.iter().chain(&self.tag_manifests) {
            manifest.write(&self.root)?;
        }
        debug!("Committed manifests of {}", self.root.display());
        Ok(())
    }

    /// Write `bag-info.txt`
    pub fn save_info(&self) -> Result<()> {
        self.info.write(&self.root)
    }

    /// Recompute `Payload-Oxum` if the bag declares one; returns true when the
    /// value changed
    pub fn refresh_payload_oxum(&mut self) -> Result<bool> {
        let Some(current) = self.info.get(info::PAYLOAD_OXUM) else {
            return Ok(false);
        };

        let payload_dir = self.root.join(PAYLOAD_DIR);
        let mut octets: u64 = 0;
        let mut count: u64 = 0;
        for entry in WalkDir::new(&payload_dir) {
            let entry = entry.map_err(|e| {
                Error::IoError(format!("Failed to walk {}: {}", payload_dir.display(), e))
            })?;
            if entry.file_type().is_file() {
                let metadata = entry
                    .metadata()
                    .map_err(|e| Error::IoError(format!("Failed to stat {}: {}", entry.path().display(), e)))?;
                octets += metadata.len();
                count += 1;
            }
        }

        let oxum = format!("{}.{}", octets, count);
        if current == oxum {
            return Ok(false);
        }
        debug!("Payload-Oxum of {}: {} -> {}", self.root.display(), current, oxum);
        self.info.set(info::PAYLOAD_OXUM, oxum);
        Ok(true)
    }
}
