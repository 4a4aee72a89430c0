// src/subtitles.rs

//! Subtitle files that accompany a real AV asset
//!
//! Subtitles are stored three directory levels above the asset:
//!
//! ```text
//! <video dir>/nl_interview.vtt          <- subtitles, language "nl"
//! <video dir>/en_interview.srt          <- subtitles, language "en"
//! <video dir>/rawvideo/2/interview.mp4  <- asset
//! ```
//!
//! The language is the part of the file name before the first underscore.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SUBTITLE_EXTENSIONS: [&str; 2] = ["srt", "vtt"];

#[derive(Debug, Default)]
pub struct Subtitles {
    language_to_file: BTreeMap<String, PathBuf>,
}

impl Subtitles {
    /// Find the subtitles for `asset`
    pub fn for_asset(asset: &Path) -> Result<Self> {
        let dir = asset
            .ancestors()
            .nth(3)
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or_else(|| {
                Error::IoError(format!(
                    "No subtitle directory three levels above {}",
                    asset.display()
                ))
            })?;

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| Error::io("Failed to list", dir, e))? {
            let entry = entry.map_err(|e| Error::io("Failed to list", dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_subtitle = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SUBTITLE_EXTENSIONS.contains(&ext));
            if is_subtitle {
                files.push(path);
            }
        }
        files.sort();

        let mut language_to_file: BTreeMap<String, PathBuf> = BTreeMap::new();
        for path in files {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((language, _)) = name.split_once('_') else {
                debug!("Ignoring subtitle file without language prefix: {}", path.display());
                continue;
            };
            if language.is_empty() {
                debug!("Ignoring subtitle file without language prefix: {}", path.display());
                continue;
            }
            if let Some(existing) = language_to_file.get(language) {
                warn!(
                    "Several subtitle files for language {}, keeping {} and ignoring {}",
                    language,
                    existing.display(),
                    path.display()
                );
                continue;
            }
            language_to_file.insert(language.to_string(), path.clone());
        }

        Ok(Self { language_to_file })
    }

    /// Available language codes, sorted
    pub fn languages(&self) -> Vec<&str> {
        self.language_to_file.keys().map(String::as_str).collect()
    }

    pub fn subtitle_file(&self, language: &str) -> Option<&Path> {
        self.language_to_file.get(language).map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.language_to_file.is_empty()
    }
}
