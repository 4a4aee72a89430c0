// src/lib.rs

//! AV export conversion
//!
//! Rewrites exported archival bags so that zero-length audio/video
//! placeholders are replaced by the real media files and their subtitles,
//! keeping `files.xml`, the payload and tag manifests and the version lineage
//! in `bag-info.txt` consistent.
//!
//! # Architecture
//!
//! - Grouping: bags under an export root are grouped per dataset, one or two
//!   versions each ([`ExportGrouper`])
//! - Versioning: substitutions go into a version 2 copy, never into version 1
//!   ([`versioning::ensure_version2`])
//! - Manifests: edits are applied in memory and written by an explicit
//!   commit ([`Bag`])
//! - Failure isolation: one broken dataset does not stop the run unless
//!   fail-fast is requested ([`ConversionEngine`])

pub mod bag;
pub mod config;
pub mod convert;
mod error;
pub mod exports;
pub mod fsutil;
pub mod hash;
pub mod metadata;
pub mod sources;
pub mod subtitles;
pub mod versioning;
pub mod xml;

pub use bag::{Bag, BagInfo, Manifest, ManifestKind};
pub use config::{Config, DEFAULT_CONFIG_PATH};
pub use convert::{ConversionEngine, ConversionOptions, ConversionReport, DatasetPlan};
pub use error::{Error, Result};
pub use exports::{DatasetGroup, ExportGrouper, bag_dir};
pub use hash::{Hash, HashAlgorithm, Hasher};
pub use metadata::{DatasetXml, FilesXml};
pub use sources::SourceMap;
pub use subtitles::Subtitles;
