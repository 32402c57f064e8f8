//! CSV decoding and encoding for datasets

use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::sanitizer::{physical_line_count, sanitize};
use crate::table::{Dataset, Row};
use std::fs;
use std::path::Path;

const BOM: char = '\u{feff}';

/// Decode CSV text into a Dataset
///
/// The first record is the header. The text is sanitized first, and a
/// mismatch between decoded rows and physical lines is reported as a
/// diagnostic rather than an error.
pub fn decode(text: &str, source_name: &str, diag: &dyn Diagnostics) -> Result<Dataset> {
    let text = text.strip_prefix(BOM).unwrap_or(text);

    let original_lines = physical_line_count(text);
    let cleaned = sanitize(text);
    let cleaned_lines = physical_line_count(&cleaned);

    if original_lines != cleaned_lines {
        diag.info(&format!(
            "{}: line breaks cleaned, {} -> {} lines",
            source_name, original_lines, cleaned_lines
        ));
    }

    read_records(&cleaned, source_name, cleaned_lines, diag)
}

/// Decode a CSV file into a Dataset
pub fn decode_file<P: AsRef<Path>>(path: P, diag: &dyn Diagnostics) -> Result<Dataset> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let source_name = path.display().to_string();
    diag.debug(&format!(
        "{}: {} lines in file",
        source_name,
        physical_line_count(&text)
    ));

    decode(&text, &source_name, diag)
}

fn read_records(
    text: &str,
    source_name: &str,
    line_count: usize,
    diag: &dyn Diagnostics,
) -> Result<Dataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // Allow varying number of fields
        .from_reader(text.as_bytes());

    let headers = csv_reader.headers().map_err(|e| Error::Csv {
        source_name: source_name.to_string(),
        source: e,
    })?;

    let mut fieldnames: Vec<String> = headers.iter().map(str::to_string).collect();

    // The marker can survive into the header when the text was re-encoded
    if let Some(first) = fieldnames.first_mut() {
        if let Some(stripped) = first.strip_prefix(BOM) {
            *first = stripped.to_string();
        }
    }

    // A lone empty header field means there was no header at all
    if fieldnames.len() == 1 && fieldnames[0].is_empty() {
        fieldnames.clear();
    }
    if fieldnames.is_empty() {
        return Ok(Dataset::empty());
    }

    let mut rows = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| Error::Csv {
            source_name: source_name.to_string(),
            source: e,
        })?;

        if record.len() > fieldnames.len() {
            diag.warn(&format!(
                "{}: row {} has {} cells but only {} columns, dropping the extra cells",
                source_name,
                row_idx + 1,
                record.len(),
                fieldnames.len()
            ));
        }

        let mut row = Row::new();
        for (name, value) in fieldnames.iter().zip(record.iter()) {
            row.insert(name.as_str(), value);
        }
        rows.push(row);
    }

    let expected = line_count.saturating_sub(1);
    if rows.len() != expected {
        diag.warn(&format!(
            "{}: expected {} rows but decoded {}",
            source_name,
            expected,
            rows.len()
        ));
    }

    Ok(Dataset::new(fieldnames, rows))
}

/// Encode a header and rows as CSV text with `\n` line endings
///
/// Columns a row has no value for are written as empty fields.
pub fn encode(fieldnames: &[String], rows: &[Row]) -> Result<String> {
    if fieldnames.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(fieldnames).map_err(encode_error)?;
    for row in rows {
        writer
            .write_record(fieldnames.iter().map(|name| row.get_or_empty(name)))
            .map_err(encode_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Encode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::Encode(e.to_string()))
}

/// Encode a whole dataset
pub fn encode_dataset(dataset: &Dataset) -> Result<String> {
    encode(&dataset.fieldnames, &dataset.rows)
}

fn encode_error(e: csv::Error) -> Error {
    Error::Csv {
        source_name: "<output>".to_string(),
        source: e,
    }
}
