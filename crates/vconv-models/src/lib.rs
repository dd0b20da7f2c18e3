//! Shared data models for the VConv worker.
//!
//! This crate provides Serde-serializable types for:
//! - Object-storage change notifications
//! - Trace levels and entries
//! - The structured invocation report

pub mod event;
pub mod trace;

// Re-export common types
pub use event::{BucketRef, EventRecord, ObjectRef, S3Entity, StorageEvent};
pub use trace::{InvocationReport, TraceEntry, TraceLevel};
