//! S3 client implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Configuration for the S3 client.
///
/// Every field is optional; unset fields fall back to the default AWS
/// provider chain (environment, profile, instance/Lambda role).
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    /// Custom S3 API endpoint (MinIO, R2, LocalStack)
    pub endpoint_url: Option<String>,
    /// Region override
    pub region: Option<String>,
    /// Static access key ID
    pub access_key_id: Option<String>,
    /// Static secret access key
    pub secret_access_key: Option<String>,
    /// Use path-style addressing (required by most non-AWS endpoints)
    pub force_path_style: bool,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok(),
            region: std::env::var("S3_REGION").ok(),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY").ok(),
            force_path_style: std::env::var("S3_FORCE_PATH_STYLE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Static credentials, only when both halves are configured.
    fn static_credentials(&self) -> Option<Credentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => {
                Some(Credentials::new(id, secret, None, None, "vconv-static"))
            }
            _ => None,
        }
    }
}

/// S3 storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Create a new S3 client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        if config.access_key_id.is_some() != config.secret_access_key.is_some() {
            return Err(StorageError::config_error(
                "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together",
            ));
        }

        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder = Builder::from(&sdk_config).force_path_style(config.force_path_style);

        if let Some(credentials) = config.static_credentials() {
            builder = builder.credentials_provider(credentials);
        }
        if let Some(region) = config.region {
            builder = builder.region(Region::new(region));
        }
        if let Some(endpoint) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        Self::new(S3Config::from_env()).await
    }

    /// Check connectivity to a bucket by performing a head bucket operation.
    pub async fn check_connectivity(&self, bucket: &str) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("S3 connectivity check failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn download_to(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()> {
        debug!("Downloading s3://{}/{} to {}", bucket, key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let no_such_key = e
                    .as_service_error()
                    .map(|s| s.is_no_such_key())
                    .unwrap_or(false);
                if no_such_key {
                    StorageError::not_found(format!("{}/{}", bucket, key))
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut body = response.body;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0usize;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        info!(
            "Downloaded s3://{}/{} to {} ({} bytes)",
            bucket,
            key,
            path.display(),
            written
        );
        Ok(())
    }

    async fn upload_from(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        debug!("Uploading {} to s3://{}/{}", path.display(), bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to s3://{}/{}", path.display(), bucket, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_credentials_need_both_halves() {
        let config = S3Config {
            access_key_id: Some("AKIA".to_string()),
            ..Default::default()
        };
        assert!(config.static_credentials().is_none());

        let config = S3Config {
            access_key_id: Some("AKIA".to_string()),
            secret_access_key: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(config.static_credentials().is_some());
    }

    #[tokio::test]
    async fn test_rejects_half_configured_credentials() {
        let config = S3Config {
            secret_access_key: Some("secret".to_string()),
            ..Default::default()
        };
        let result = S3Client::new(config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
