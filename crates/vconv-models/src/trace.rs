//! Trace levels, entries and the invocation report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Severity of a trace entry.
///
/// Variants are declared in ascending order so the derived `Ord`
/// gives `Debug < Info < Warn < Error`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl TraceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceLevel::Debug => "debug",
            TraceLevel::Info => "info",
            TraceLevel::Warn => "warn",
            TraceLevel::Error => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TraceLevel::Error)
    }
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One leveled, timestamped event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub level: TraceLevel,
    pub message: String,
    pub time: DateTime<Utc>,
    /// Snapshot of the data in flight when the entry was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<Value>,
}

/// Structured record emitted once per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationReport {
    /// Invocation start time
    pub time: DateTime<Utc>,
    /// Worst level among `trace`, `info` when empty
    pub level: TraceLevel,
    pub trace: Vec<TraceEntry>,
}
