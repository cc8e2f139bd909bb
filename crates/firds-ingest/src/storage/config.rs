use crate::error::UploadError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom S3-compatible endpoint (MinIO, LocalStack, ...); `None` is AWS
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: Option<String>,
    /// Explicit credentials; the default AWS provider chain is used when unset
    #[serde(skip_serializing)]
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub path_style: bool,
    /// Prepended to every object key
    pub key_prefix: String,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, UploadError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the `S3_*` variables (with their `AWS_*` fallbacks) through
    /// `lookup`. An unrecognized `S3_PATH_STYLE` value is a config error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, UploadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let path_style = match var("S3_PATH_STYLE") {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                UploadError::Config(format!("S3_PATH_STYLE: '{}' is not a boolean", value))
            })?,
            None => false,
        };

        Ok(Self {
            endpoint: var("S3_ENDPOINT"),
            region: var("S3_REGION").or_else(|| var("AWS_REGION")),
            bucket: var("S3_BUCKET"),
            access_key: var("S3_ACCESS_KEY").or_else(|| var("AWS_ACCESS_KEY_ID")),
            secret_key: var("S3_SECRET_KEY").or_else(|| var("AWS_SECRET_ACCESS_KEY")),
            path_style,
            key_prefix: var("S3_KEY_PREFIX").unwrap_or_default(),
        })
    }

    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            region: Some("us-east-1".to_string()),
            bucket: Some(bucket.into()),
            access_key: Some("minioadmin".to_string()),
            secret_key: Some("minioadmin".to_string()),
            path_style: true,
            key_prefix: String::new(),
        }
    }

    pub fn for_aws(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            bucket: Some(bucket.into()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        if self.bucket.as_deref().map_or(true, |b| b.trim().is_empty()) {
            return Err(UploadError::Config("S3_BUCKET is not set".to_string()));
        }

        if self.region.as_deref().map_or(true, |r| r.trim().is_empty()) {
            return Err(UploadError::Config("S3_REGION is not set".to_string()));
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(UploadError::Config(
                "access key and secret key must be set together".to_string(),
            ));
        }

        Ok(())
    }

    /// Object key for a published file name.
    pub fn object_key(&self, name: &str) -> String {
        let prefix = self.key_prefix.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        }
    }

    /// Public URL of `key` once uploaded with a public-read ACL.
    pub fn public_url(&self, key: &str) -> String {
        let bucket = self.bucket.as_deref().unwrap_or_default();

        match &self.endpoint {
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                bucket,
                self.region.as_deref().unwrap_or("us-east-1"),
                key
            ),
            Some(endpoint) if self.path_style => {
                format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
            },
            // virtual-hosted: the bucket becomes a subdomain of the endpoint host
            Some(endpoint) => {
                let endpoint = endpoint.trim_end_matches('/');
                let (scheme, host) = endpoint.split_once("://").unwrap_or(("https", endpoint));
                format!("{}://{}.{}/{}", scheme, bucket, host, key)
            },
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
