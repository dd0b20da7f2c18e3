//! Conversion units: one source/target pair per eligible notification.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;
use vconv_models::EventRecord;

use crate::config::ConversionProfile;
use crate::error::{WorkerError, WorkerResult};

/// One source→target conversion job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionUnit {
    pub bucket: String,
    /// Decoded key of the source object
    pub source_key: String,
    pub target_key: String,
    pub local_source_path: PathBuf,
    pub local_target_path: PathBuf,
}

impl ConversionUnit {
    /// Build a unit for the decoded `source_key`, or `None` when the key
    /// does not carry the profile's source suffix.
    pub fn new(
        bucket: impl Into<String>,
        source_key: impl Into<String>,
        profile: &ConversionProfile,
        scratch_dir: &Path,
    ) -> Option<Self> {
        let source_key = source_key.into();
        if !is_eligible(&source_key, profile) {
            return None;
        }
        let stem = &source_key[..source_key.len() - profile.source_suffix.len()];
        let target_key = format!("{}{}", stem, profile.target_suffix);

        Some(Self {
            bucket: bucket.into(),
            local_source_path: local_path(scratch_dir, &source_key),
            local_target_path: local_path(scratch_dir, &target_key),
            source_key,
            target_key,
        })
    }

    /// Decode the record's key and build a unit if it is eligible.
    ///
    /// A key that cannot be decoded is an error only when it would
    /// otherwise name a source object; anything else is not ours to report.
    pub fn from_record(
        record: &EventRecord,
        profile: &ConversionProfile,
        scratch_dir: &Path,
    ) -> WorkerResult<Option<Self>> {
        let raw = record.raw_key();
        match decode_key(raw) {
            Ok(key) => Ok(Self::new(record.bucket(), key, profile, scratch_dir)),
            Err(e) if is_eligible(&decode_key_lossy(raw), profile) => Err(e),
            Err(_) => Ok(None),
        }
    }

    /// Remove both local files.
    ///
    /// Missing files are not errors. Every removal is attempted; the
    /// failures are returned rather than short-circuiting.
    pub async fn cleanup(&self) -> Vec<(PathBuf, io::Error)> {
        let mut failures = Vec::new();

        for path in [&self.local_source_path, &self.local_target_path] {
            if let Err(e) = remove_if_exists(path).await {
                failures.push((path.clone(), e));
            }
        }

        failures
    }
}

/// Whether `key` (already decoded) should be converted.
pub fn is_eligible(key: &str, profile: &ConversionProfile) -> bool {
    key.ends_with(profile.source_suffix.as_str())
}

/// Decode an object key as delivered in storage notifications.
///
/// Keys are form-encoded: a literal `+` stands for a space, `%XX` for
/// any other escaped byte.
///
/// `+` is replaced before percent-decoding so an escaped `%2B` stays a
/// literal `+` in the decoded key instead of turning into a space.
pub fn decode_key(raw: &str) -> WorkerResult<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|key| key.into_owned())
        .map_err(|e| WorkerError::invalid_key(raw, e.to_string()))
}

/// Like [`decode_key`], with invalid UTF-8 replaced instead of rejected.
fn decode_key_lossy(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    let bytes = urlencoding::decode_binary(spaced.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Scratch location for `key`: its final path segment under `scratch_dir`.
pub fn local_path(scratch_dir: &Path, key: &str) -> PathBuf {
    let name = key.rsplit('/').next().unwrap_or(key);
    scratch_dir.join(name)
}

async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
