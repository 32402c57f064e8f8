//! datesync-core: Core library for reconciling CSV exports by date
//!
//! This library provides functionality to:
//! - Repair quoted CSV fields broken across lines
//! - Decode CSV text into datasets and encode them back
//! - Normalize date values into comparison keys
//! - Merge a fresh export into a published dataset, replacing rows by date
//! - Resolve file identifiers from sharing URLs
//! - Run the fetch / merge / publish pipeline against a store

pub mod config;
pub mod datekey;
pub mod diagnostics;
pub mod error;
pub mod history;
pub mod merger;
pub mod parser;
pub mod resolver;
pub mod sanitizer;
pub mod store;
pub mod sync;
pub mod table;

pub use config::{BatchFile, StoreConfig, SyncJob, SyncOptions};
pub use datekey::{date_key, parse_date};
pub use diagnostics::{Diagnostic, Diagnostics, Level, LogSink, MemorySink, NullSink};
pub use error::{Error, Result};
pub use history::{record_run, HistoryEntry, RunHistory};
pub use merger::{merge, MergeResult, MergeStats};
pub use parser::{decode, decode_file, encode, encode_dataset};
pub use resolver::resolve;
pub use sanitizer::sanitize;
pub use store::{Acknowledgement, DirStore, FetchError, Store, StoreError};
pub use sync::{reconcile_text, sync, sync_job, SyncOutcome, SyncReport};
pub use table::{ColumnSet, Dataset, Row};
