//! History of reconciliation runs
//!
//! Records what each run changed so an operator can audit the published
//! datasets afterwards.

use crate::error::{Error, Result};
use crate::sync::SyncReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A record of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the run finished
    pub timestamp: DateTime<Utc>,
    /// Job label
    pub job: String,
    /// What the run did
    pub report: SyncReport,
}

/// History file containing all recorded runs
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunHistory {
    /// Entries grouped by dataset identifier
    pub entries: BTreeMap<String, Vec<HistoryEntry>>,
}

impl RunHistory {
    /// Create a new empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Load history from a file, or create empty if not exists
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save history to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Add an entry to the history
    pub fn add_entry(&mut self, entry: HistoryEntry) {
        self.entries
            .entry(entry.report.identifier.clone())
            .or_default()
            .push(entry);
    }

    /// Get history for a specific dataset
    pub fn for_identifier(&self, identifier: &str) -> Option<&Vec<HistoryEntry>> {
        self.entries.get(identifier)
    }

    /// Get the most recent run for a dataset
    pub fn last_entry(&self, identifier: &str) -> Option<&HistoryEntry> {
        self.entries.get(identifier).and_then(|v| v.last())
    }

    /// Get total number of entries
    pub fn total_entries(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }
}

/// Create a history entry for a finished run
pub fn create_history_entry(job: &str, report: SyncReport) -> HistoryEntry {
    HistoryEntry {
        timestamp: Utc::now(),
        job: job.to_string(),
        report,
    }
}

/// Append one run to the history file at `path`
pub fn record_run<P: AsRef<Path>>(path: P, job: &str, report: &SyncReport) -> Result<()> {
    let path = path.as_ref();
    let mut history = RunHistory::load(path)?;
    history.add_entry(create_history_entry(job, report.clone()));
    history.save(path)
}
