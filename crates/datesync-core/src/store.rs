//! Remote store boundary
//!
//! The orchestrator reads the published dataset through `Store::fetch` and
//! overwrites it through `Store::store`. `DirStore` keeps datasets as files
//! in a local directory; network-backed stores live in other crates.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure to read the published dataset
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("resource '{0}' not found")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to overwrite the published dataset
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("store did not acknowledge '{0}'")]
    Unacknowledged(String),

    #[error("malformed store response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// What the store reported after an upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Identifier of the resource that was written
    pub id: Option<String>,
    /// Stored size in bytes, when reported
    pub size: Option<u64>,
}

impl Acknowledgement {
    /// Check that this acknowledges a write of `identifier`
    pub fn confirm(&self, identifier: &str) -> Result<(), StoreError> {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() && id == identifier => Ok(()),
            _ => Err(StoreError::Unacknowledged(identifier.to_string())),
        }
    }
}

/// A place datasets are published to
pub trait Store {
    /// Full UTF-8 text of the resource
    fn fetch(&self, identifier: &str) -> Result<String, FetchError>;

    /// Overwrite the resource with `text`
    fn store(&self, identifier: &str, text: &str) -> Result<Acknowledgement, StoreError>;
}

/// Store backed by a local directory; the identifier is the file name
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Create a store rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the datasets
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `identifier`
    pub fn path_for(&self, identifier: &str) -> PathBuf {
        self.root.join(identifier)
    }
}

impl Store for DirStore {
    fn fetch(&self, identifier: &str) -> Result<String, FetchError> {
        let path = self.path_for(identifier);
        match fs::read(&path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(identifier.to_string()))
            }
            Err(e) => Err(FetchError::Io(e)),
        }
    }

    fn store(&self, identifier: &str, text: &str) -> Result<Acknowledgement, StoreError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(identifier), text)?;
        Ok(Acknowledgement {
            id: Some(identifier.to_string()),
            size: Some(text.len() as u64),
        })
    }
}
