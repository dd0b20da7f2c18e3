//! Storage seam used by the conversion pipeline.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Get/put access to an object store.
///
/// Implementations are assumed to handle authentication and retries.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch `bucket/key` into the local file at `path`, replacing it.
    async fn download_to(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()>;

    /// Store the local file at `path` as `bucket/key`.
    async fn upload_from(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()>;
}
