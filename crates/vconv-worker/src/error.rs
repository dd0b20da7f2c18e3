//! Worker error types.

use std::error::Error as StdError;

use serde::Serialize;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Storage error: {0}")]
    Storage(#[from] vconv_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] vconv_media::MediaError),

    #[error("Trace error: {0}")]
    Trace(String),

    #[error("Invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
}

/// Error details attached to an `error` trace entry.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetails {
    pub error: String,
    /// `source()` chain, outermost first
    pub causes: Vec<String>,
}

impl WorkerError {
    pub fn trace(msg: impl Into<String>) -> Self {
        Self::Trace(msg.into())
    }

    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Stable kind name, used as the message of the error's trace entry.
    pub fn name(&self) -> &'static str {
        match self {
            WorkerError::Storage(_) => "StorageError",
            WorkerError::Media(_) => "MediaError",
            WorkerError::Trace(_) => "TraceError",
            WorkerError::InvalidKey { .. } => "InvalidKeyError",
        }
    }

    pub fn details(&self) -> ErrorDetails {
        let mut causes = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            causes.push(err.to_string());
            source = err.source();
        }

        ErrorDetails {
            error: self.to_string(),
            causes,
        }
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Trace(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vconv_media::MediaError;

    #[test]
    fn test_details_follow_source_chain() {
        let spawn = MediaError::spawn(
            "/opt/bin/ffmpeg",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        let err = WorkerError::from(spawn);

        assert_eq!(err.name(), "MediaError");
        let details = err.details();
        assert!(details.error.starts_with("Media error: Failed to spawn"));
        assert_eq!(details.causes.len(), 2);
        assert_eq!(details.causes[1], "no such file");
    }
}
