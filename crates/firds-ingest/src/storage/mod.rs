//! Publishing tables to S3-compatible object storage

use crate::error::UploadError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::ObjectCannedAcl,
    Client,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub mod config;

pub use config::StorageConfig;

const CSV_CONTENT_TYPE: &str = "text/csv";

/// Where a published file ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedObject {
    pub key: String,
    pub url: String,
    pub size: u64,
    pub sha256: String,
}

/// Publishes a local file under a destination name.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path, destination_name: &str) -> Result<PublishedObject, UploadError>;
}

#[derive(Clone)]
pub struct S3Uploader {
    client: Client,
    config: StorageConfig,
}

impl std::fmt::Debug for S3Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Uploader")
            .field("bucket", &self.config.bucket)
            .field("endpoint", &self.config.endpoint)
            .finish()
    }
}

impl S3Uploader {
    pub async fn new(config: StorageConfig) -> Result<Self, UploadError> {
        config.validate()?;
        let region = Region::new(config.region.clone().unwrap_or_default());

        let mut builder = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                debug!("using explicit S3 credentials");
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "firds-ingest");
                aws_sdk_s3::Config::builder()
                    .behavior_version(BehaviorVersion::latest())
                    .credentials_provider(credentials)
                    .region(region)
            },
            _ => {
                debug!("using the default AWS credential chain");
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&shared)
            },
        };

        builder = builder.force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());

        info!(
            bucket = config.bucket.as_deref().unwrap_or_default(),
            "storage client initialized"
        );

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn bucket(&self) -> &str {
        self.config.bucket.as_deref().unwrap_or_default()
    }
}

#[async_trait]
impl Uploader for S3Uploader {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn upload(&self, path: &Path, destination_name: &str) -> Result<PublishedObject, UploadError> {
        let key = self.config.object_key(destination_name);
        let read_error = |message: String| UploadError::Read {
            path: path.display().to_string(),
            message,
        };

        let size = tokio::fs::metadata(path)
            .await
            .map_err(|e| read_error(e.to_string()))?
            .len();
        let sha256 = file_checksum(path.to_path_buf())
            .await
            .map_err(read_error)?;

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| read_error(e.to_string()))?;

        debug!(size, bucket = self.bucket(), %key, "uploading");

        self.client
            .put_object()
            .bucket(self.bucket())
            .key(&key)
            .body(body)
            .content_type(CSV_CONTENT_TYPE)
            .content_length(size as i64)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| UploadError::Put {
                bucket: self.bucket().to_string(),
                key: key.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let url = self.config.public_url(&key);
        info!(%url, size, "table published");

        Ok(PublishedObject {
            key,
            url,
            size,
            sha256,
        })
    }
}

/// SHA-256 of a file, computed off the async runtime.
async fn file_checksum(path: PathBuf) -> Result<String, String> {
    tokio::task::spawn_blocking(move || firds_common::checksum::compute_file_checksum(&path))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_requires_bucket() {
        let err = S3Uploader::new(StorageConfig::default()).await.unwrap_err();
        assert!(matches!(err, UploadError::Config(_)));
    }

    #[tokio::test]
    async fn test_new_with_explicit_credentials() {
        let uploader = S3Uploader::new(StorageConfig::for_minio("http://localhost:9000", "firds"))
            .await
            .unwrap();
        assert_eq!(uploader.bucket(), "firds");
        assert_eq!(
            uploader.config().public_url("a.csv"),
            "http://localhost:9000/firds/a.csv"
        );
    }

    #[tokio::test]
    async fn test_upload_missing_file_is_read_error() {
        let uploader = S3Uploader::new(StorageConfig::for_minio("http://127.0.0.1:9", "firds"))
            .await
            .unwrap();
        let dir = tempfile::TempDir::new().unwrap();

        let err = uploader
            .upload(&dir.path().join("absent.csv"), "absent.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Read { .. }));
    }

    #[tokio::test]
    async fn test_file_checksum() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "hello world").unwrap();

        assert_eq!(
            file_checksum(path).await.unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
