//! Job configuration and batch files
//!
//! This module provides:
//! - `SyncOptions`: the values a single reconciliation consumes
//! - `SyncJob`: one dataset to reconcile against one published resource
//! - `BatchFile` (JSON): several jobs sharing one store

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_true() -> bool {
    true
}

/// Options for one reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Column holding the date used as merge key
    pub date_column: String,
    /// Compare dates by calendar day instead of raw text
    #[serde(default = "default_true")]
    pub normalize_date: bool,
    /// Compute and report without uploading
    #[serde(default)]
    pub dry_run: bool,
    /// Where a dry run writes the merged CSV
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_path: Option<PathBuf>,
    /// When the existing dataset cannot be fetched, publish the new dataset
    /// alone instead of failing
    #[serde(default = "default_true")]
    pub allow_overwrite_on_fetch_failure: bool,
}

impl SyncOptions {
    /// Options with defaults for everything but the date column
    pub fn new(date_column: impl Into<String>) -> Self {
        Self {
            date_column: date_column.into(),
            normalize_date: true,
            dry_run: false,
            preview_path: None,
            allow_overwrite_on_fetch_failure: true,
        }
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> Result<()> {
        if self.date_column.trim().is_empty() {
            return Err(Error::Configuration("date column must not be empty".to_string()));
        }
        Ok(())
    }
}

/// One dataset to reconcile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    /// Label used in output and history
    pub name: String,
    /// Identifier or sharing URL of the published dataset
    pub target: String,
    /// Freshly exported CSV
    pub new_path: PathBuf,
    #[serde(flatten)]
    pub options: SyncOptions,
}

/// Which store a batch publishes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Local directory, one file per identifier
    Dir { root: PathBuf },
    /// Remote file API; the access token is read from `token_env`
    Http {
        api_base: String,
        #[serde(default = "default_token_env")]
        token_env: String,
    },
}

fn default_token_env() -> String {
    "DATESYNC_ACCESS_TOKEN".to_string()
}

/// A batch file listing several jobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFile {
    pub store: StoreConfig,
    /// Run history file appended after every job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<PathBuf>,
    pub jobs: Vec<SyncJob>,
}

impl BatchFile {
    /// Load a batch file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        let batch: BatchFile = serde_json::from_str(&content).map_err(Error::Json)?;
        batch.validate()?;
        Ok(batch)
    }

    /// Save the batch file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate every job
    pub fn validate(&self) -> Result<()> {
        for job in &self.jobs {
            if job.options.date_column.trim().is_empty() {
                return Err(Error::Configuration(format!(
                    "job '{}': date column must not be empty",
                    job.name
                )));
            }
        }
        Ok(())
    }
}
