//! Fetch, merge and publish one dataset
//!
//! The pipeline is: fetch the published text, decode both datasets, merge by
//! date, encode, then either upload or (dry run) write a local preview.

use crate::config::{SyncJob, SyncOptions};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::merger::{merge, MergeStats};
use crate::parser::{decode, decode_file, encode_dataset};
use crate::resolver::resolve;
use crate::store::{Acknowledgement, Store};
use crate::table::Dataset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What happened to the merged text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Written to the store and acknowledged
    Uploaded { ack: Acknowledgement },
    /// Dry run, merged text written to a local file
    Previewed { path: PathBuf },
    /// Dry run without a preview path
    Reported,
}

/// Summary of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Bare identifier of the published dataset
    pub identifier: String,
    pub stats: MergeStats,
    /// Rows in the merged dataset
    pub total_rows: usize,
    /// Size of the merged CSV text
    pub bytes: usize,
    /// The existing dataset could not be fetched and was treated as empty
    pub fetch_degraded: bool,
    pub outcome: SyncOutcome,
}

/// Merge two CSV texts; the core of a run without any I/O
pub fn reconcile_text(
    existing_text: &str,
    new_text: &str,
    date_column: &str,
    normalize: bool,
    diag: &dyn Diagnostics,
) -> Result<(String, MergeStats)> {
    let existing = decode(existing_text, "existing", diag)?;
    let new = decode(new_text, "new", diag)?;
    let merged = merge(existing, new, date_column, normalize, diag)?;
    Ok((encode_dataset(&merged.dataset)?, merged.stats))
}

/// Run a configured job
pub fn sync_job(store: &dyn Store, job: &SyncJob, diag: &dyn Diagnostics) -> Result<SyncReport> {
    diag.info(&format!("Job '{}'", job.name));
    sync(store, &job.target, &job.new_path, &job.options, diag)
}

/// Reconcile the dataset at `new_path` into the published resource `target`
pub fn sync(
    store: &dyn Store,
    target: &str,
    new_path: &Path,
    options: &SyncOptions,
    diag: &dyn Diagnostics,
) -> Result<SyncReport> {
    options.validate()?;

    let identifier = resolve(target);
    diag.info(&format!("Processing update of '{}'", identifier));

    let (existing, fetch_degraded) = fetch_existing(store, &identifier, options, diag)?;

    let new = decode_file(new_path, diag)?;
    diag.info(&format!("New dataset: {} rows", new.rows.len()));

    let merged = merge(
        existing,
        new,
        &options.date_column,
        options.normalize_date,
        diag,
    )?;
    let text = encode_dataset(&merged.dataset)?;
    let stats = merged.stats;

    let outcome = if options.dry_run {
        diag.info(&format!(
            "DRY RUN: {} dates, {} rows replaced, {} new rows",
            stats.distinct_dates, stats.removed, stats.added
        ));
        match &options.preview_path {
            Some(path) => {
                write_preview(path, &text)?;
                diag.info(&format!("Preview saved: {}", path.display()));
                SyncOutcome::Previewed { path: path.clone() }
            }
            None => SyncOutcome::Reported,
        }
    } else {
        let ack = upload(store, &identifier, &text, merged.dataset.rows.len(), diag)?;
        diag.info(&format!(
            "Update completed: {} dates, {} rows replaced",
            stats.distinct_dates, stats.removed
        ));
        SyncOutcome::Uploaded { ack }
    };

    Ok(SyncReport {
        identifier,
        stats,
        total_rows: merged.dataset.rows.len(),
        bytes: text.len(),
        fetch_degraded,
        outcome,
    })
}

/// Fetch and decode the published dataset, degrading to an empty one when
/// the options allow it
fn fetch_existing(
    store: &dyn Store,
    identifier: &str,
    options: &SyncOptions,
    diag: &dyn Diagnostics,
) -> Result<(Dataset, bool)> {
    match store.fetch(identifier) {
        Ok(text) => {
            let existing = decode(&text, identifier, diag)?;
            diag.info(&format!("Downloaded existing dataset: {} rows", existing.rows.len()));
            Ok((existing, false))
        }
        Err(e) if options.allow_overwrite_on_fetch_failure => {
            diag.warn(&format!(
                "Could not fetch existing dataset '{}': {}; the new dataset will replace it",
                identifier, e
            ));
            Ok((Dataset::empty(), true))
        }
        Err(e) => {
            diag.warn(&format!("Could not fetch existing dataset '{}': {}", identifier, e));
            Err(Error::Fetch(e))
        }
    }
}

fn upload(
    store: &dyn Store,
    identifier: &str,
    text: &str,
    row_count: usize,
    diag: &dyn Diagnostics,
) -> Result<Acknowledgement> {
    diag.info("Uploading merged dataset...");
    diag.info(&format!(
        "  Size: {:.2} MB, {} rows",
        text.len() as f64 / (1024.0 * 1024.0),
        row_count
    ));

    let ack = store.store(identifier, text).map_err(|e| {
        diag.warn(&format!("Upload of '{}' failed: {}", identifier, e));
        Error::Store(e)
    })?;

    ack.confirm(identifier).map_err(|e| {
        diag.warn(&format!("Upload of '{}' failed: {}", identifier, e));
        Error::Store(e)
    })?;

    diag.info("Upload confirmed");
    Ok(ack)
}

fn write_preview(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Level, MemorySink, NullSink};
    use crate::store::{DirStore, FetchError, StoreError};
    use std::cell::RefCell;

    /// In-memory store with scripted failures
    #[derive(Default)]
    struct FakeStore {
        existing: Option<String>,
        ack: Option<Acknowledgement>,
        uploads: RefCell<Vec<(String, String)>>,
    }

    impl Store for FakeStore {
        fn fetch(&self, identifier: &str) -> std::result::Result<String, FetchError> {
            self.existing
                .clone()
                .ok_or_else(|| FetchError::Transport(format!("timed out fetching {}", identifier)))
        }

        fn store(
            &self,
            identifier: &str,
            text: &str,
        ) -> std::result::Result<Acknowledgement, StoreError> {
            self.uploads
                .borrow_mut()
                .push((identifier.to_string(), text.to_string()));
            Ok(self.ack.clone().unwrap_or_default())
        }
    }

    fn write_new(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("new.csv");
        fs::write(&path, text).unwrap();
        path
    }

    fn acked(id: &str) -> Option<Acknowledgement> {
        Some(Acknowledgement {
            id: Some(id.to_string()),
            size: None,
        })
    }

    #[test]
    fn test_reconcile_text() {
        let (text, stats) = reconcile_text(
            "Date,Qty\n2025-11-01,5\n2025-11-03,7\n",
            "Date,Qty\n11/3/2025,9\n11/4/2025,2\n",
            "Date",
            true,
            &NullSink,
        )
        .unwrap();

        assert_eq!(text, "Date,Qty\n2025-11-01,5\n11/3/2025,9\n11/4/2025,2\n");
        assert_eq!(stats.removed, 1);
    }

    #[test]
    fn test_sync_uploads_merged_text() {
        let dir = tempfile::tempdir().unwrap();
        let new_path = write_new(dir.path(), "Date,Qty\n2025-11-03,9\n");
        let store = FakeStore {
            existing: Some("\u{feff}Date,Qty\n2025-11-01,5\n2025-11-03,7\n".to_string()),
            ack: acked("ABC123"),
            ..Default::default()
        };

        let report = sync(
            &store,
            "https://store.example/file/d/ABC123/view",
            &new_path,
            &SyncOptions::new("Date"),
            &NullSink,
        )
        .unwrap();

        let uploads = store.uploads.borrow();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "ABC123");
        assert_eq!(uploads[0].1, "Date,Qty\n2025-11-01,5\n2025-11-03,9\n");

        assert_eq!(report.identifier, "ABC123");
        assert_eq!(report.total_rows, 2);
        assert!(!report.fetch_degraded);
        assert!(matches!(report.outcome, SyncOutcome::Uploaded { .. }));
    }

    #[test]
    fn test_sync_fetch_failure_degrades_to_new_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let new_path = write_new(dir.path(), "Date,Qty\n2025-11-03,9\n");
        let store = FakeStore {
            existing: None,
            ack: acked("ABC123"),
            ..Default::default()
        };
        let sink = MemorySink::new();

        let report = sync(&store, "ABC123", &new_path, &SyncOptions::new("Date"), &sink).unwrap();

        assert!(report.fetch_degraded);
        assert_eq!(report.stats.kept, 0);
        assert_eq!(store.uploads.borrow()[0].1, "Date,Qty\n2025-11-03,9\n");
        assert!(sink.contains(Level::Warn, "the new dataset will replace it"));
    }

    #[test]
    fn test_sync_strict_fetch_aborts_before_upload() {
        let dir = tempfile::tempdir().unwrap();
        let new_path = write_new(dir.path(), "Date,Qty\n2025-11-03,9\n");
        let store = FakeStore::default();
        let mut options = SyncOptions::new("Date");
        options.allow_overwrite_on_fetch_failure = false;

        let err = sync(&store, "ABC123", &new_path, &options, &NullSink).unwrap_err();

        assert!(matches!(err, Error::Fetch(FetchError::Transport(_))));
        assert!(store.uploads.borrow().is_empty());
    }

    #[test]
    fn test_sync_unacknowledged_upload_fails() {
        let dir = tempfile::tempdir().unwrap();
        let new_path = write_new(dir.path(), "Date,Qty\n2025-11-03,9\n");
        let store = FakeStore {
            existing: Some("Date,Qty\n".to_string()),
            ack: None,
            ..Default::default()
        };
        let sink = MemorySink::new();

        let err = sync(&store, "ABC123", &new_path, &SyncOptions::new("Date"), &sink).unwrap_err();

        assert!(matches!(err, Error::Store(StoreError::Unacknowledged(_))));
        assert!(sink.contains(Level::Warn, "Upload of 'ABC123' failed"));
    }

    #[test]
    fn test_sync_dry_run_writes_preview_only() {
        let dir = tempfile::tempdir().unwrap();
        let new_path = write_new(dir.path(), "Date,Qty\n2025-11-03,9\n");
        let preview = dir.path().join("previews/nested/merged.csv");
        let store = FakeStore {
            existing: Some("Date,Qty\n2025-11-01,5\n".to_string()),
            ..Default::default()
        };

        let mut options = SyncOptions::new("Date");
        options.dry_run = true;
        options.preview_path = Some(preview.clone());

        let report = sync(&store, "ABC123", &new_path, &options, &NullSink).unwrap();

        assert!(store.uploads.borrow().is_empty());
        assert_eq!(
            fs::read_to_string(&preview).unwrap(),
            "Date,Qty\n2025-11-01,5\n2025-11-03,9\n"
        );
        assert_eq!(report.outcome, SyncOutcome::Previewed { path: preview });
    }

    #[test]
    fn test_sync_dry_run_without_preview_reports() {
        let dir = tempfile::tempdir().unwrap();
        let new_path = write_new(dir.path(), "Date,Qty\n2025-11-03,9\n");
        let store = FakeStore::default();
        let mut options = SyncOptions::new("Date");
        options.dry_run = true;
        let sink = MemorySink::new();

        let report = sync(&store, "ABC123", &new_path, &options, &sink).unwrap();

        assert_eq!(report.outcome, SyncOutcome::Reported);
        assert!(sink.contains(Level::Info, "DRY RUN: 1 dates, 0 rows replaced, 1 new rows"));
    }

    #[test]
    fn test_sync_rejects_empty_date_column_before_fetching() {
        let store = FakeStore::default();
        let err = sync(
            &store,
            "ABC123",
            Path::new("does-not-exist.csv"),
            &SyncOptions::new(""),
            &NullSink,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_sync_job_with_dir_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path().join("published"));
        store
            .store("scrap.csv", "Report Date,Qty\n11/5/2025,1\n11/6/2025,2\n")
            .unwrap();

        let job = SyncJob {
            name: "scrap".to_string(),
            target: "scrap.csv".to_string(),
            new_path: write_new(dir.path(), "Report Date,Qty\n11/6/2025 3:00 PM,8\n"),
            options: SyncOptions::new("Report Date"),
        };

        let report = sync_job(&store, &job, &NullSink).unwrap();

        assert_eq!(report.stats.removed, 1);
        assert_eq!(
            store.fetch("scrap.csv").unwrap(),
            "Report Date,Qty\n11/5/2025,1\n11/6/2025 3:00 PM,8\n"
        );
    }
}
