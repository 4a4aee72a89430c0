// src/metadata/mod.rs

//! Metadata documents stored under `metadata/` in an exported bag
//!
//! - `dataset.xml`: descriptive metadata (DDM), source of the dataset id and
//!   the persistent identifiers recorded in version lineage
//! - `files.xml`: one record per payload file with its id and access rights

pub mod dataset;
pub mod files;

pub use dataset::DatasetXml;
pub use files::FilesXml;

/// Namespace URIs used by the EASY metadata formats
pub mod ns {
    pub const DDM: &str = "http://easy.dans.knaw.nl/schemas/md/ddm/";
    pub const DCTERMS: &str = "http://purl.org/dc/terms/";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
    pub const FILES: &str = "http://easy.dans.knaw.nl/schemas/bag/metadata/files/";
}
