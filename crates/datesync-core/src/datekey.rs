//! Date keys used to match rows between datasets
//!
//! With normalization on, a raw value is tried against an ordered list of
//! formats and reduced to its calendar date (`YYYY-MM-DD`). Anything that
//! does not parse is compared by its trimmed text.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// One entry of the format list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateFormat {
    /// chrono format string
    pub pattern: &'static str,
    /// Whether the pattern carries a time of day
    pub has_time: bool,
}

impl DateFormat {
    const fn date(pattern: &'static str) -> Self {
        Self { pattern, has_time: false }
    }

    const fn timestamp(pattern: &'static str) -> Self {
        Self { pattern, has_time: true }
    }

    /// Try to parse `value` with this format
    pub fn parse(&self, value: &str) -> Option<NaiveDate> {
        let date = if self.has_time {
            NaiveDateTime::parse_from_str(value, self.pattern)
                .ok()
                .map(|dt| dt.date())
        } else {
            NaiveDate::parse_from_str(value, self.pattern).ok()
        }?;

        // chrono accepts short years for %Y; "11/6/25" belongs to %y
        if self.pattern.contains("%Y") && date.year() < 1000 {
            return None;
        }
        Some(date)
    }
}

/// Formats in the order they are tried. Timestamps come first so a value
/// with a time is never cut short by a bare-date pattern.
pub const DATE_FORMATS: &[DateFormat] = &[
    DateFormat::timestamp("%m/%d/%Y, %I:%M %p"),
    DateFormat::timestamp("%m/%d/%Y %I:%M %p"),
    DateFormat::timestamp("%m/%d/%Y, %I:%M:%S %p"),
    DateFormat::timestamp("%m/%d/%Y %I:%M:%S %p"),
    DateFormat::timestamp("%m/%d/%Y, %H:%M"),
    DateFormat::timestamp("%m/%d/%Y, %H:%M:%S"),
    DateFormat::timestamp("%m/%d/%Y %H:%M"),
    DateFormat::timestamp("%m/%d/%Y %H:%M:%S"),
    DateFormat::timestamp("%Y-%m-%d %H:%M:%S"),
    DateFormat::timestamp("%Y-%m-%d %H:%M"),
    DateFormat::timestamp("%Y-%m-%dT%H:%M:%S"),
    DateFormat::date("%m/%d/%Y"),
    DateFormat::date("%m/%d/%y"),
    DateFormat::date("%Y-%m-%d"),
    DateFormat::date("%Y/%m/%d"),
    DateFormat::date("%d/%m/%Y"),
    DateFormat::date("%d-%m-%Y"),
];

/// Parse a date using the first matching format
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS.iter().find_map(|format| format.parse(value))
}

/// Comparison key for a raw date-column value
pub fn date_key(raw: &str, normalize: bool) -> String {
    if normalize {
        if let Some(date) = parse_date(raw) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    raw.trim().to_string()
}
