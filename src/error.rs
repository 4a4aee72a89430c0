// src/error.rs

//! Crate-wide error type
//!
//! Each variant corresponds to one class of failure in a conversion run.
//! Grouping and precondition failures abort the run; everything raised while
//! a single dataset is converted is wrapped in [`Error::DatasetFailed`] at the
//! dataset boundary.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed export layout: wrong subdirectory counts, too many bags for
    /// a dataset, missing or ambiguous descriptor
    #[error("Structural error: {0}")]
    StructuralError(String),

    /// A file id or path lookup failed
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// An expected metadata field is absent
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Identifiers or timestamps could not be interpreted
    #[error("Metadata error: {0}")]
    MetadataError(String),

    /// Filesystem operation failed (copy, delete, list)
    #[error("I/O error: {0}")]
    IoError(String),

    /// A precondition on the environment does not hold
    #[error("State error: {0}")]
    StateError(String),

    /// Syntax error in an XML or CSV document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Conversion of one dataset failed
    #[error("Dataset {dataset_id} failed: {source}")]
    DatasetFailed {
        dataset_id: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an I/O error with the operation and path it belongs to
    pub fn io(action: &str, path: &std::path::Path, err: std::io::Error) -> Self {
        Error::IoError(format!("{} {}: {}", action, path.display(), err))
    }

    /// Attach a dataset id to an error raised while converting that dataset
    pub fn for_dataset(dataset_id: &str, err: Error) -> Self {
        match err {
            Error::DatasetFailed { .. } => err,
            other => Error::DatasetFailed {
                dataset_id: dataset_id.to_string(),
                source: Box::new(other),
            },
        }
    }
}
