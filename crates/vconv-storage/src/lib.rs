//! Object storage client.
//!
//! This crate provides:
//! - The `ObjectStore` seam used by the conversion pipeline
//! - Streaming download of an object into a local file
//! - Upload of a local file with an explicit content type
//! - An S3 implementation on the AWS SDK

pub mod client;
pub mod error;
pub mod store;

pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use store::ObjectStore;

#[cfg(any(test, feature = "mock"))]
pub use store::MockObjectStore;
