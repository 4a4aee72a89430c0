// src/convert.rs

//! Conversion of exported bags
//!
//! Each dataset goes through one of three plans, decided up front:
//!
//! - [`DatasetPlan::Substitute`]: the source map lists files for the dataset.
//!   Version 2 is created if needed, placeholders are swapped for the real
//!   assets plus subtitles, and empty files are cleaned up.
//! - [`DatasetPlan::CleanupVersion2`]: no substitutions, but a version 2
//!   already exists. Only empty-file cleanup is applied to it.
//! - [`DatasetPlan::Version1Only`]: nothing is done beyond version 1.
//!
//! Version 1 always gets empty-file cleanup. Every bag is moved to the output
//! directory once its manifests are consistent again; a bag is not converted
//! until it has been moved.

use crate::bag::Bag;
use crate::bag::info::BAG_INFO;
use crate::error::{Error, Result};
use crate::exports::{DatasetGroup, ExportGrouper, bag_dir};
use crate::fsutil;
use crate::hash::HashAlgorithm;
use crate::metadata::FilesXml;
use crate::metadata::files::FILES_XML;
use crate::sources::SourceMap;
use crate::subtitles::Subtitles;
use crate::versioning;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Settings of a conversion run
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Where converted bag parents are moved to; must be empty or absent
    pub output_dir: PathBuf,
    /// Abort on the first failing dataset instead of recording it
    pub fail_fast: bool,
    /// Manifest algorithms a bag may use
    pub algorithms: Vec<HashAlgorithm>,
}

/// Outcome of a run that was not aborted
#[derive(Debug, Default)]
pub struct ConversionReport {
    /// Datasets whose bags were all moved to the output directory
    pub converted: Vec<String>,
    /// Datasets that failed, with the error that stopped them
    pub failed: Vec<(String, Error)>,
}

impl ConversionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What happens to a dataset besides cleaning up version 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetPlan {
    Substitute,
    CleanupVersion2,
    Version1Only,
}

impl DatasetPlan {
    pub fn for_group(group: &DatasetGroup, sources: &SourceMap) -> Self {
        if sources.has_substitutions(group.dataset_id()) {
            DatasetPlan::Substitute
        } else if group.version2().is_some() {
            DatasetPlan::CleanupVersion2
        } else {
            DatasetPlan::Version1Only
        }
    }
}

pub struct ConversionEngine<'a> {
    sources: &'a SourceMap,
    options: ConversionOptions,
}

impl<'a> ConversionEngine<'a> {
    pub fn new(sources: &'a SourceMap, options: ConversionOptions) -> Self {
        Self { sources, options }
    }

    /// Convert every dataset found in `export_root`
    ///
    /// Layout problems and a non-empty output directory abort the run before
    /// any dataset is touched. Dataset failures abort it only in fail-fast
    /// mode; otherwise they are collected in the report.
    pub fn convert(&self, export_root: &Path) -> Result<ConversionReport> {
        let output_dir = &self.options.output_dir;
        if !fsutil::is_empty_or_absent(output_dir)? {
            return Err(Error::StateError(format!(
                "Output directory {} is not empty",
                output_dir.display()
            )));
        }
        fs::create_dir_all(output_dir).map_err(|e| Error::io("Failed to create", output_dir, e))?;

        let exports = ExportGrouper::scan(export_root)?;
        let mut report = ConversionReport::default();

        for group in exports.groups() {
            let dataset_id = group.dataset_id();
            match self.convert_dataset(group) {
                Ok(()) => {
                    info!("Converted dataset {}", dataset_id);
                    report.converted.push(dataset_id.to_string());
                }
                Err(e) => {
                    let e = Error::for_dataset(dataset_id, e);
                    error!("{}", e);
                    if self.options.fail_fast {
                        return Err(e);
                    }
                    report.failed.push((dataset_id.to_string(), e));
                }
            }
        }

        info!(
            "Conversion finished: {} converted, {} failed",
            report.converted.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Convert the bags of a single dataset and move them to the output
    /// directory
    pub fn convert_dataset(&self, group: &DatasetGroup) -> Result<()> {
        let dataset_id = group.dataset_id();
        let plan = DatasetPlan::for_group(group, self.sources);
        info!("Converting dataset {} ({:?})", dataset_id, plan);

        match plan {
            DatasetPlan::Substitute => {
                let created = group.version2().is_none();
                let version2 = versioning::ensure_version2(group, &self.options.algorithms)?;
                if let Err(e) = self.substitute_version2(dataset_id, &version2) {
                    if created {
                        discard(&version2);
                    }
                    return Err(e);
                }
                self.relocate(&version2)?;
            }
            DatasetPlan::CleanupVersion2 => {
                if let Some(version2) = group.version2() {
                    let mut package = Package::open(version2, &self.options.algorithms)?;
                    package.remove_empty_files()?;
                    package.finish()?;
                    self.relocate(version2)?;
                }
            }
            DatasetPlan::Version1Only => {}
        }

        let version1 = group.version1();
        let mut package = Package::open(version1, &self.options.algorithms)?;
        package.remove_empty_files()?;
        package.finish()?;
        self.relocate(version1)
    }

    fn substitute_version2(&self, dataset_id: &str, version2: &Path) -> Result<()> {
        let mut package = Package::open(version2, &self.options.algorithms)?;
        self.substitute_all(dataset_id, &mut package)?;
        package.remove_empty_files()?;
        package.finish()
    }

    /// Substitute every mapped file of the dataset. An asset shared by several
    /// file ids is copied once; the later records point at that copy.
    fn substitute_all(&self, dataset_id: &str, package: &mut Package) -> Result<()> {
        let mut copied: HashMap<&Path, String> = HashMap::new();
        for file_id in self.sources.file_ids_for(dataset_id) {
            let asset = self.sources.asset_path_for(&file_id)?;
            if let Some(path) = copied.get(asset) {
                debug!(
                    "Asset {} already copied to {}, reusing it for {}",
                    asset.display(),
                    path,
                    file_id
                );
                package.point_at(&file_id, path)?;
                continue;
            }
            let path = package.substitute(&file_id, asset)?;
            copied.insert(asset, path);
        }
        Ok(())
    }

    fn relocate(&self, bag_parent: &Path) -> Result<()> {
        let name = bag_parent.file_name().ok_or_else(|| {
            Error::StructuralError(format!("Bag parent {} has no name", bag_parent.display()))
        })?;
        let target = self.options.output_dir.join(name);
        fsutil::move_dir(bag_parent, &target)?;
        info!("Moved {} to {}", bag_parent.display(), target.display());
        Ok(())
    }
}

/// A bag opened for editing together with its `files.xml`
///
/// Replaced placeholders stay on disk until [`Package::finish`], so a
/// substitution that fails midway leaves the bag as it was found apart from
/// extra copies.
struct Package {
    bag: Bag,
    files: FilesXml,
    replaced: Vec<String>,
}

impl Package {
    fn open(bag_parent: &Path, algorithms: &[HashAlgorithm]) -> Result<Self> {
        let dir = bag_dir(bag_parent)?;
        let bag = Bag::open(&dir, algorithms)?;
        let files = FilesXml::from_file(&dir.join(FILES_XML))?;
        Ok(Self {
            bag,
            files,
            replaced: Vec::new(),
        })
    }

    /// Replace the placeholder of `file_id` with `asset` and add its subtitles.
    /// Returns the bag path of the copy.
    fn substitute(&mut self, file_id: &str, asset: &Path) -> Result<String> {
        let old_path = self.files.path_for(file_id)?;
        let extension = asset.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let new_path = replace_extension(&old_path, extension);

        fsutil::copy_file(asset, &self.bag.resolve(&new_path))?;
        debug!("{}: {} -> {}", file_id, old_path, new_path);
        self.point_at(file_id, &new_path)?;
        self.bag.upsert_payload_entry(&new_path)?;

        let subtitles = Subtitles::for_asset(asset)?;
        if subtitles.is_empty() {
            return Ok(new_path);
        }
        let accessibility = self.files.accessibility_for(file_id)?;
        for language in subtitles.languages() {
            let Some(source) = subtitles.subtitle_file(language) else {
                continue;
            };
            let subtitle_path = subtitle_path(&new_path, language);
            fsutil::copy_file(source, &self.bag.resolve(&subtitle_path))?;
            let id = self.files.add(&subtitle_path, &accessibility);
            self.bag.upsert_payload_entry(&subtitle_path)?;
            debug!("Added {} subtitles for {} as {} ({})", language, file_id, subtitle_path, id);
        }
        Ok(new_path)
    }

    /// Point the record of `file_id` at `path`, which is already in the bag.
    /// The old file is deleted when the package is finished.
    fn point_at(&mut self, file_id: &str, path: &str) -> Result<()> {
        let old_path = self.files.path_for(file_id)?;
        self.files.set_path_for(file_id, path)?;
        if old_path != path {
            self.bag.remove_payload_entry(&old_path);
            self.replaced.push(old_path);
        }
        Ok(())
    }

    /// Drop every record whose file is empty, together with the file and its
    /// manifest entries
    fn remove_empty_files(&mut self) -> Result<usize> {
        let mut removed = 0;
        for id in self.files.file_ids() {
            let path = self.files.path_for(&id)?;
            let file = self.bag.resolve(&path);
            let metadata = fs::metadata(&file).map_err(|e| Error::io("Failed to stat", &file, e))?;
            if metadata.len() > 0 {
                continue;
            }
            fs::remove_file(&file).map_err(|e| Error::io("Failed to delete", &file, e))?;
            self.files.remove(&id)?;
            self.bag.remove_payload_entry(&path);
            debug!("Removed empty file {} ({})", path, id);
            removed += 1;
        }
        if removed > 0 {
            info!("Removed {} empty files from {}", removed, self.bag.root().display());
        }
        Ok(removed)
    }

    /// Delete replaced placeholders, persist `files.xml` and bring all
    /// manifests in line with the bag
    fn finish(mut self) -> Result<()> {
        for path in &self.replaced {
            let file = self.bag.resolve(path);
            fs::remove_file(&file).map_err(|e| Error::io("Failed to delete", &file, e))?;
        }
        self.files.save()?;

        let has_info = self.bag.resolve(BAG_INFO).exists();
        if has_info && self.bag.refresh_payload_oxum()? {
            self.bag.save_info()?;
        }

        let mut tag_files = vec![FILES_XML];
        if has_info {
            tag_files.push(BAG_INFO);
        }
        self.bag.upsert_tag_entries(&tag_files)?;
        self.bag.sync_manifest_of_manifests()?;
        self.bag.commit()
    }
}

/// Remove a version 2 that this run created but could not finish
fn discard(version2: &Path) {
    match fs::remove_dir_all(version2) {
        Ok(()) => info!("Removed unfinished version 2 {}", version2.display()),
        Err(e) => warn!("Failed to remove unfinished version 2 {}: {}", version2.display(), e),
    }
}

fn extension_start(path: &str) -> Option<usize> {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(0) | None => None,
        Some(i) => Some(name_start + i),
    }
}

fn strip_extension(path: &str) -> &str {
    match extension_start(path) {
        Some(i) => &path[..i],
        None => path,
    }
}

/// `path` with its extension replaced by `extension` (added if it had none)
fn replace_extension(path: &str, extension: &str) -> String {
    let stem = strip_extension(path);
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{}.{}", stem, extension)
    }
}

/// Bag path of the subtitles in `language` for the media file at `media_path`
fn subtitle_path(media_path: &str, language: &str) -> String {
    format!("{}.{}.vtt", strip_extension(media_path), language)
}
