//! Invocation trace state.
//!
//! `TraceContext` accumulates leveled, timestamped entries across one
//! invocation and derives the invocation's severity. It is owned by the
//! batch orchestrator and shared by reference with every unit pipeline;
//! appends go through a mutex so concurrent pipelines never lose entries.
//! Entries from one pipeline keep their relative order, entries from
//! different pipelines interleave arbitrarily.
//!
//! The context performs no I/O. Emitting the final report is up to the
//! caller of [`TraceContext::finalize`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use vconv_models::{InvocationReport, TraceEntry, TraceLevel};

use crate::error::WorkerResult;

#[derive(Debug, Clone)]
struct TraceState {
    started_at: DateTime<Utc>,
    entries: Vec<TraceEntry>,
}

impl TraceState {
    fn fresh() -> Self {
        Self {
            started_at: Utc::now(),
            entries: Vec::new(),
        }
    }
}

/// Per-invocation trace accumulator.
#[derive(Debug, Default)]
pub struct TraceContext {
    state: Mutex<Option<TraceState>>,
}

impl TraceContext {
    /// Create an uninitialized context.
    ///
    /// The first append initializes it lazily; call [`init`](Self::init)
    /// to pin the start time explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to an empty entry sequence starting now.
    pub fn init(&self) {
        *self.lock() = Some(TraceState::fresh());
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().is_some()
    }

    /// Append an entry.
    pub fn record(&self, level: TraceLevel, message: impl Into<String>, aux: Option<Value>) {
        let entry = TraceEntry {
            level,
            message: message.into(),
            time: Utc::now(),
            aux,
        };

        self.lock()
            .get_or_insert_with(TraceState::fresh)
            .entries
            .push(entry);
    }

    /// Record-and-continue: append an entry whose auxiliary data is a
    /// snapshot of `value`, then hand `value` back unchanged.
    pub fn record_value<T: Serialize>(
        &self,
        level: TraceLevel,
        message: impl Into<String>,
        value: T,
    ) -> WorkerResult<T> {
        let aux = serde_json::to_value(&value)?;
        self.record(level, message, Some(aux));
        Ok(value)
    }

    /// Like [`record_value`](Self::record_value) with explicit auxiliary data.
    pub fn record_with<A: Serialize + ?Sized, T>(
        &self,
        level: TraceLevel,
        message: impl Into<String>,
        aux: &A,
        value: T,
    ) -> WorkerResult<T> {
        let aux = serde_json::to_value(aux)?;
        self.record(level, message, Some(aux));
        Ok(value)
    }

    pub fn info<T: Serialize>(&self, message: impl Into<String>, value: T) -> WorkerResult<T> {
        self.record_value(TraceLevel::Info, message, value)
    }

    pub fn warn<T: Serialize>(&self, message: impl Into<String>, value: T) -> WorkerResult<T> {
        self.record_value(TraceLevel::Warn, message, value)
    }

    /// Worst level recorded so far.
    pub fn severity(&self) -> TraceLevel {
        self.lock()
            .as_ref()
            .map(|state| severity_of(&state.entries))
            .unwrap_or_default()
    }

    /// Copy of the entries recorded so far.
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.lock()
            .as_ref()
            .map(|state| state.entries.clone())
            .unwrap_or_default()
    }

    /// Compute the severity and close the trace.
    pub fn finalize(self) -> (TraceLevel, InvocationReport) {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or_else(TraceState::fresh);

        let level = severity_of(&state.entries);
        let report = InvocationReport {
            time: state.started_at,
            level,
            trace: state.entries,
        };
        (level, report)
    }

    // A panic while holding the lock cannot leave the entry vector
    // half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Option<TraceState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Maximum level across `entries`, `Info` when there are none.
pub fn severity_of(entries: &[TraceEntry]) -> TraceLevel {
    entries
        .iter()
        .map(|entry| entry.level)
        .max()
        .unwrap_or(TraceLevel::Info)
}
