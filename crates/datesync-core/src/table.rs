//! Core dataset types for representing decoded CSV data

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A decoded CSV dataset: ordered column names plus ordered rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Column names in output order
    pub fieldnames: Vec<String>,
    /// Row data
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Create a dataset from its parts
    pub fn new(fieldnames: Vec<String>, rows: Vec<Row>) -> Self {
        Self { fieldnames, rows }
    }

    /// A dataset with no columns and no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.fieldnames.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the dataset has no header at all
    pub fn has_no_columns(&self) -> bool {
        self.fieldnames.is_empty()
    }

    /// Check whether a column is declared
    pub fn has_column(&self, name: &str) -> bool {
        self.fieldnames.iter().any(|f| f == name)
    }
}

/// A row of string values keyed by column name
///
/// A row may lack values for some columns of its dataset; those encode as
/// empty fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    values: BTreeMap<String, String>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from (column, value) pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a value by column name
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Get a value, treating an absent column as the empty string
    pub fn get_or_empty(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    /// Set a value
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    /// Number of columns that carry a value
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the row carries no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Insertion-ordered set of column names
///
/// Keeps the first occurrence of every name.
#[derive(Debug, Clone, Default)]
pub struct ColumnSet {
    names: Vec<String>,
    seen: HashSet<String>,
}

impl ColumnSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name if it has not been seen; returns whether it was added
    pub fn insert(&mut self, name: &str) -> bool {
        if self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_string());
        self.names.push(name.to_string());
        true
    }

    /// Add every name from `names`, in order
    pub fn extend<'a, I: IntoIterator<Item = &'a String>>(&mut self, names: I) {
        for name in names {
            self.insert(name);
        }
    }

    /// Check membership
    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Consume the set, yielding names in first-seen order
    pub fn into_vec(self) -> Vec<String> {
        self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_get_or_empty() {
        let row = Row::from_pairs([("Date", "2025-11-01"), ("Qty", "5")]);
        assert_eq!(row.get("Qty"), Some("5"));
        assert_eq!(row.get("Missing"), None);
        assert_eq!(row.get_or_empty("Missing"), "");
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_column_set_keeps_first_seen_order() {
        let existing = vec!["Date".to_string(), "Qty".to_string()];
        let new = vec!["Qty".to_string(), "Shift".to_string(), "Date".to_string()];

        let mut set = ColumnSet::new();
        set.extend(&existing);
        set.extend(&new);

        assert!(set.contains("Shift"));
        assert_eq!(set.len(), 3);
        assert_eq!(set.into_vec(), vec!["Date", "Qty", "Shift"]);
    }

    #[test]
    fn test_column_set_insert_reports_duplicates() {
        let mut set = ColumnSet::new();
        assert!(set.insert("A"));
        assert!(!set.insert("A"));
        assert!(!set.is_empty());
    }

    #[test]
    fn test_dataset_counts() {
        let ds = Dataset::new(
            vec!["Date".into(), "Qty".into()],
            vec![Row::from_pairs([("Date", "x")])],
        );
        assert_eq!(ds.column_count(), 2);
        assert_eq!(ds.row_count(), 1);
        assert!(ds.has_column("Qty"));
        assert!(!ds.has_no_columns());
        assert!(Dataset::empty().has_no_columns());
    }
}
