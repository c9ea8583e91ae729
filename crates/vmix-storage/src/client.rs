//! S3 client implementation.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Destination for finished artifacts.
///
/// Uploads return the public URL of the stored object.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload_file(&self, path: &Path, key: &str, content_type: &str)
        -> StorageResult<String>;

    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Reachability check used by the readiness endpoint.
    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name
    pub bucket_name: String,
    /// AWS region
    pub region: String,
    /// Static access key; falls back to the default credential chain when unset
    pub access_key_id: Option<String>,
    /// Static secret key
    pub secret_access_key: Option<String>,
    /// Custom S3-compatible endpoint (MinIO, LocalStack)
    pub endpoint_url: Option<String>,
    /// Base for public URLs instead of the virtual-hosted AWS form
    pub public_base_url: Option<String>,
    /// Attach the `public-read` canned ACL to uploads
    pub public_read: bool,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            bucket_name: non_empty("AWS_BUCKET_NAME")
                .ok_or_else(|| StorageError::config_error("AWS_BUCKET_NAME not set"))?,
            region: non_empty("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id: non_empty("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty("AWS_SECRET_ACCESS_KEY"),
            endpoint_url: non_empty("AWS_ENDPOINT_URL"),
            public_base_url: non_empty("AWS_PUBLIC_BASE_URL"),
            public_read: std::env::var("AWS_PUBLIC_READ")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
        })
    }

    /// Public URL of `key` in this bucket.
    pub fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket_name, self.region, key
            ),
        }
    }
}

/// S3 artifact store.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    config: S3Config,
}

impl S3Store {
    /// Create a new client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => {
                let credentials = Credentials::new(key, secret, None, None, "vmix-env");
                Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
            }
            (None, None) => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                Builder::from(&shared)
            }
            _ => {
                return Err(StorageError::config_error(
                    "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together",
                ))
            }
        };

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            config,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }

    pub fn public_url(&self, key: &str) -> String {
        self.config.public_url(key)
    }

    fn acl(&self) -> Option<ObjectCannedAcl> {
        self.config.public_read.then_some(ObjectCannedAcl::PublicRead)
    }

    async fn put(&self, body: ByteStream, key: &str, content_type: &str) -> StorageResult<String> {
        if key.is_empty() || key.starts_with('/') {
            return Err(StorageError::invalid_key(key));
        }

        self.client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(key)
            .body(body)
            .content_type(content_type)
            .set_acl(self.acl())
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;

        Ok(self.public_url(key))
    }
}

#[async_trait]
impl ArtifactStore for S3Store {
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        let url = self.put(body, key, content_type).await?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(url)
    }

    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        debug!("Uploading {} bytes to {}", data.len(), key);
        self.put(ByteStream::from(data), key, content_type).await
    }

    /// Head the bucket.
    async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket_name)
            .send()
            .await
            .map_err(|e| StorageError::config_error(format!("S3 connectivity check failed: {}", e)))?;
        Ok(())
    }
}
