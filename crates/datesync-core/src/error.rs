//! Error types for datesync-core

use crate::store::{FetchError, StoreError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in datesync-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{source_name}': {source}")]
    Csv {
        source_name: String,
        #[source]
        source: csv::Error,
    },

    /// Missing or invalid configuration value
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The existing dataset could not be fetched and overwriting was not allowed
    #[error("failed to fetch existing dataset: {0}")]
    Fetch(#[from] FetchError),

    /// The store rejected or did not acknowledge an upload
    #[error("upload failed: {0}")]
    Store(#[from] StoreError),

    /// Failed to produce CSV output
    #[error("failed to encode CSV: {0}")]
    Encode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
