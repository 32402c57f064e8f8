//! Merge engine: replace existing rows by date with a newer export

use crate::datekey::date_key;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::table::{ColumnSet, Dataset, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// How many sample keys or column names to include in diagnostics
const SAMPLE_SIZE: usize = 3;

/// Row counters for a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Existing rows whose date is not in the new dataset
    pub kept: usize,
    /// Existing rows dropped because the new dataset covers their date
    pub removed: usize,
    /// Rows contributed by the new dataset
    pub added: usize,
    /// Distinct date keys in the new dataset
    pub distinct_dates: usize,
}

/// A merged dataset with its counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub dataset: Dataset,
    pub stats: MergeStats,
}

/// Merge `new` into `existing`, replacing every existing row whose date key
/// appears in `new`
///
/// Kept rows stay in their original order and are followed by all rows of
/// `new` in theirs. When `existing` has no header the result is `new` as is.
pub fn merge(
    existing: Dataset,
    new: Dataset,
    date_column: &str,
    normalize: bool,
    diag: &dyn Diagnostics,
) -> Result<MergeResult> {
    if date_column.trim().is_empty() {
        return Err(Error::Configuration("date column must not be empty".to_string()));
    }

    let new_keys = date_keys(&new.rows, date_column, normalize);

    if existing.has_no_columns() {
        diag.info(&format!(
            "Existing dataset is empty, adopting new dataset ({} rows, {} columns)",
            new.rows.len(),
            new.fieldnames.len()
        ));
        let stats = MergeStats {
            kept: 0,
            removed: 0,
            added: new.rows.len(),
            distinct_dates: new_keys.len(),
        };
        return Ok(MergeResult { dataset: new, stats });
    }

    let fieldnames = unify_columns(&existing.fieldnames, &new.fieldnames, diag);

    report_date_coverage(&new, date_column, diag);
    diag.info(&format!(
        "New dataset has {} rows with {} distinct dates",
        new.rows.len(),
        new_keys.len()
    ));
    if let Some(sample) = sample_keys(new_keys.iter()) {
        diag.debug(&format!("Sample new dates: {}", sample));
    }

    let (kept, removed_by_date, old_keys) =
        partition(existing.rows, &new_keys, date_column, normalize);
    let removed: usize = removed_by_date.values().sum();

    diag.info(&format!(
        "Existing dataset has {} rows with {} distinct dates",
        kept.len() + removed,
        old_keys.len()
    ));
    if let Some(sample) = sample_keys(old_keys.iter()) {
        diag.debug(&format!("Sample existing dates: {}", sample));
    }

    if removed_by_date.is_empty() {
        diag.info(&format!(
            "Appending {} new rows (no matching dates)",
            new.rows.len()
        ));
    } else {
        diag.info(&format!(
            "Replacing {} dates ({} -> {} rows)",
            removed_by_date.len(),
            removed,
            new.rows.len()
        ));
    }

    let stats = MergeStats {
        kept: kept.len(),
        removed,
        added: new.rows.len(),
        distinct_dates: new_keys.len(),
    };

    let mut rows = kept;
    rows.extend(new.rows);

    diag.info(&format!(
        "Merge result: {} kept + {} new = {} rows",
        stats.kept,
        stats.added,
        rows.len()
    ));

    Ok(MergeResult {
        dataset: Dataset::new(fieldnames, rows),
        stats,
    })
}

/// Set of date keys over `rows`; an absent date value keys as ""
pub fn date_keys(rows: &[Row], date_column: &str, normalize: bool) -> HashSet<String> {
    rows.iter()
        .map(|row| date_key(row.get_or_empty(date_column), normalize))
        .collect()
}

/// Existing columns followed by new columns not seen yet
///
/// Equal column counts with different names usually mean a renamed export
/// column; that is reported but does not stop the merge.
fn unify_columns(existing: &[String], new: &[String], diag: &dyn Diagnostics) -> Vec<String> {
    let mut columns = ColumnSet::new();
    columns.extend(existing);
    columns.extend(new);

    if columns.len() != existing.len() && existing.len() == new.len() {
        diag.warn("Column names differ between existing and new datasets");

        let new_set: HashSet<&str> = new.iter().map(String::as_str).collect();
        let old_set: HashSet<&str> = existing.iter().map(String::as_str).collect();

        let only_old: Vec<&str> = existing
            .iter()
            .map(String::as_str)
            .filter(|c| !new_set.contains(c))
            .take(SAMPLE_SIZE)
            .collect();
        let only_new: Vec<&str> = new
            .iter()
            .map(String::as_str)
            .filter(|c| !old_set.contains(c))
            .take(SAMPLE_SIZE)
            .collect();

        if !only_old.is_empty() {
            diag.warn(&format!("  Columns only in existing: {}", only_old.join(", ")));
        }
        if !only_new.is_empty() {
            diag.warn(&format!("  Columns only in new: {}", only_new.join(", ")));
        }
    }

    columns.into_vec()
}

/// Split existing rows into kept rows (order preserved) and removal counts
/// per date key; also returns every key seen in `rows`
fn partition(
    rows: Vec<Row>,
    new_keys: &HashSet<String>,
    date_column: &str,
    normalize: bool,
) -> (Vec<Row>, BTreeMap<String, usize>, HashSet<String>) {
    let mut kept = Vec::with_capacity(rows.len());
    let mut removed_by_date: BTreeMap<String, usize> = BTreeMap::new();
    let mut old_keys = HashSet::new();

    for row in rows {
        let key = date_key(row.get_or_empty(date_column), normalize);
        if new_keys.contains(&key) {
            *removed_by_date.entry(key.clone()).or_default() += 1;
        } else {
            kept.push(row);
        }
        old_keys.insert(key);
    }

    (kept, removed_by_date, old_keys)
}

fn report_date_coverage(new: &Dataset, date_column: &str, diag: &dyn Diagnostics) {
    let with_date = new
        .rows
        .iter()
        .filter(|row| !row.get_or_empty(date_column).trim().is_empty())
        .count();

    if with_date == 0 {
        let available = if new.fieldnames.is_empty() {
            "N/A".to_string()
        } else {
            new.fieldnames
                .iter()
                .take(5)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };
        diag.warn(&format!(
            "No row of the new dataset has a value in column '{}' (available: {})",
            date_column, available
        ));
    } else {
        diag.info(&format!(
            "Column '{}': {}/{} rows with a value",
            date_column,
            with_date,
            new.rows.len()
        ));
    }
}

fn sample_keys<'a, I: Iterator<Item = &'a String>>(keys: I) -> Option<String> {
    let mut sample: Vec<&str> = keys.map(String::as_str).collect();
    if sample.is_empty() {
        return None;
    }
    sample.sort_unstable();
    sample.truncate(SAMPLE_SIZE);
    Some(sample.join(", "))
}
