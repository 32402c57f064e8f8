//! Diagnostics sink for non-fatal anomalies and run summaries
//!
//! The codec, merger and orchestrator never log directly; they report through
//! a `Diagnostics` implementation handed in by the caller.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Debug,
    Info,
    Warn,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Debug => write!(f, "DEBUG"),
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARN"),
        }
    }
}

/// Receiver for leveled diagnostic messages
pub trait Diagnostics {
    /// Record a single message
    fn emit(&self, level: Level, message: &str);

    fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    fn info(&self, message: &str) {
        self.emit(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.emit(Level::Warn, message);
    }
}

/// Forwards diagnostics to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Diagnostics for LogSink {
    fn emit(&self, level: Level, message: &str) {
        match level {
            Level::Debug => log::debug!(target: "datesync", "{}", message),
            Level::Info => log::info!(target: "datesync", "{}", message),
            Level::Warn => log::warn!(target: "datesync", "{}", message),
        }
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl Diagnostics for NullSink {
    fn emit(&self, _level: Level, _message: &str) {}
}

/// A recorded diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

/// Keeps every diagnostic in memory, in emission order
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: RefCell<Vec<Diagnostic>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.borrow().clone()
    }

    /// Messages recorded at `level`
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|d| d.level == level)
            .map(|d| d.message.clone())
            .collect()
    }

    /// Whether any message at `level` contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|d| d.level == level && d.message.contains(needle))
    }

    /// Drain all recorded diagnostics
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }
}

impl Diagnostics for MemorySink {
    fn emit(&self, level: Level, message: &str) {
        self.entries.borrow_mut().push(Diagnostic {
            level,
            message: message.to_string(),
        });
    }
}
