//! Event-triggered video conversion worker.
//!
//! This crate provides:
//! - Filtering of storage notifications into conversion units
//! - The per-unit download/convert/upload/cleanup pipeline
//! - Concurrent batch orchestration with per-unit fault isolation
//! - The invocation trace and its final report

pub mod batch;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod trace;
pub mod unit;

#[cfg(test)]
mod test_support;

pub use batch::{BatchProcessor, BatchSummary, InvocationFailed, InvocationResult};
pub use config::{ConversionProfile, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use pipeline::{Pipeline, UnitOutcome, UnitStage};
pub use trace::TraceContext;
pub use unit::ConversionUnit;
