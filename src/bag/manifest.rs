// src/bag/manifest.rs

//! Manifest files of a bag
//!
//! Payload manifests are `manifest-<algorithm>.txt`, tag manifests are
//! `tagmanifest-<algorithm>.txt`. Each line is `<checksum> <path>`, where the
//! path is relative to the bag root and has `%`, CR and LF percent-encoded.

use crate::error::{Error, Result};
use crate::hash::{Hash, HashAlgorithm};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Payload,
    Tag,
}

impl ManifestKind {
    const fn prefix(&self) -> &'static str {
        match self {
            Self::Payload => "manifest-",
            Self::Tag => "tagmanifest-",
        }
    }

    /// File name of the manifest of this kind for `algorithm`
    pub fn file_name(&self, algorithm: HashAlgorithm) -> String {
        format!("{}{}.txt", self.prefix(), algorithm.name())
    }
}

/// Split a file name like `tagmanifest-sha1.txt` into kind and algorithm name
pub fn parse_file_name(name: &str) -> Option<(ManifestKind, &str)> {
    let stem = name.strip_suffix(".txt")?;
    if let Some(algorithm) = stem.strip_prefix(ManifestKind::Tag.prefix()) {
        Some((ManifestKind::Tag, algorithm))
    } else {
        stem.strip_prefix(ManifestKind::Payload.prefix())
            .map(|algorithm| (ManifestKind::Payload, algorithm))
    }
}

pub fn encode_path(path: &str) -> String {
    path.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

pub fn decode_path(path: &str) -> String {
    path.replace("%0A", "\n")
        .replace("%0a", "\n")
        .replace("%0D", "\r")
        .replace("%0d", "\r")
        .replace("%25", "%")
}

/// In-memory contents of one manifest file
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    kind: ManifestKind,
    algorithm: HashAlgorithm,
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new(kind: ManifestKind, algorithm: HashAlgorithm) -> Self {
        Self {
            kind,
            algorithm,
            entries: BTreeMap::new(),
        }
    }

    pub fn parse(kind: ManifestKind, algorithm: HashAlgorithm, content: &str) -> Result<Self> {
        let mut manifest = Self::new(kind, algorithm);
        for (number, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (checksum, path) = line
                .split_once(|c: char| c == ' ' || c == '\t')
                .map(|(checksum, path)| (checksum, path.trim_start_matches([' ', '\t'])))
                .filter(|(_, path)| !path.is_empty())
                .ok_or_else(|| {
                    Error::ParseError(format!(
                        "{} line {}: expected '<checksum> <path>'",
                        manifest.file_name(),
                        number + 1
                    ))
                })?;
            let hash = Hash::new(algorithm, checksum).map_err(|e| {
                Error::ParseError(format!("{} line {}: {}", manifest.file_name(), number + 1, e))
            })?;
            manifest.entries.insert(decode_path(path), hash.value);
        }
        Ok(manifest)
    }

    /// Read the manifest of this kind and algorithm from a bag directory
    pub fn read(bag_dir: &Path, kind: ManifestKind, algorithm: HashAlgorithm) -> Result<Self> {
        let path = bag_dir.join(kind.file_name(algorithm));
        let content =
            fs::read_to_string(&path).map_err(|e| Error::io("Failed to read", &path, e))?;
        Self::parse(kind, algorithm, &content)
    }

    /// Manifest text, entries sorted by path
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (path, checksum) in &self.entries {
            let _ = writeln!(out, "{}  {}", checksum, encode_path(path));
        }
        out
    }

    pub fn write(&self, bag_dir: &Path) -> Result<()> {
        let path = bag_dir.join(self.file_name());
        fs::write(&path, self.render()).map_err(|e| Error::io("Failed to write", &path, e))
    }

    #[inline]
    pub fn kind(&self) -> ManifestKind {
        self.kind
    }

    #[inline]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn file_name(&self) -> String {
        self.kind.file_name(self.algorithm)
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, checksum: impl Into<String>) {
        self.entries.insert(path.into(), checksum.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.entries.remove(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
