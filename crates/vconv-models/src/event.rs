//! Object-storage change notifications.
//!
//! Mirrors the shape of S3 event notifications
//! (`Records[].s3.bucket.name`, `Records[].s3.object.key`). Fields the
//! worker does not use are ignored on deserialization.

use serde::{Deserialize, Serialize};

/// A batch of change notifications delivered in one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

impl StorageEvent {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self { records }
    }
}

/// One created/changed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event type, e.g. `ObjectCreated:Put`
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

impl EventRecord {
    /// Create a record for `key` in `bucket`.
    ///
    /// The key is taken as-is, i.e. still URL-encoded the way the storage
    /// provider delivers it.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            event_name: None,
            s3: S3Entity {
                bucket: BucketRef { name: bucket.into() },
                object: ObjectRef {
                    key: key.into(),
                    size: None,
                },
            },
        }
    }

    pub fn bucket(&self) -> &str {
        &self.s3.bucket.name
    }

    /// Raw (encoded) object key.
    pub fn raw_key(&self) -> &str {
        &self.s3.object.key
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}
