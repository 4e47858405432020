//! S3-compatible object storage module
//!
//! This module builds the S3 client used for image payloads and makes sure
//! the configured bucket exists before the service starts accepting uploads.
//! A custom endpoint turns on path-style addressing so MinIO works unchanged.

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use std::env;
use tracing::{info, warn};

use crate::error::{StorageError, StorageResult};

/// Configuration for the object storage connection
#[derive(Debug, Clone)]
pub struct ObjectStorageConfig {
    /// Custom endpoint (e.g. "http://localhost:9000" for MinIO)
    pub endpoint: Option<String>,
    /// Bucket holding uploaded payloads
    pub bucket: String,
    /// Lifetime of presigned download URLs in seconds
    pub presign_expiry: u64,
}

impl ObjectStorageConfig {
    /// Create a new ObjectStorageConfig from environment variables
    ///
    /// # Environment Variables
    /// - `S3_ENDPOINT`: Custom endpoint URL (default: AWS resolution)
    /// - `S3_BUCKET`: Bucket name (default: "images")
    /// - `S3_PRESIGN_EXPIRY`: Presigned URL lifetime in seconds (default: 3600)
    ///
    /// Credentials and region come from the standard AWS environment.
    pub fn from_env() -> StorageResult<Self> {
        let endpoint = env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty());
        let bucket = env::var("S3_BUCKET").unwrap_or_else(|_| "images".to_string());
        if bucket.trim().is_empty() {
            return Err(StorageError::Configuration(
                "S3_BUCKET must not be empty".to_string(),
            ));
        }

        let presign_expiry = env::var("S3_PRESIGN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        Ok(Self {
            endpoint,
            bucket,
            presign_expiry,
        })
    }
}

/// Build an S3 client for the given configuration
pub async fn init_client(config: &ObjectStorageConfig) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let sdk_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.endpoint.is_some())
        .build();

    info!(
        "Object storage client initialized (endpoint: {})",
        config.endpoint.as_deref().unwrap_or("aws default")
    );
    Client::from_conf(s3_config)
}

/// Create the bucket if it does not exist yet
pub async fn ensure_bucket(client: &Client, bucket: &str) -> StorageResult<()> {
    if client.head_bucket().bucket(bucket).send().await.is_ok() {
        info!("Bucket {} is available", bucket);
        return Ok(());
    }

    warn!("Bucket {} not found, creating it", bucket);
    client
        .create_bucket()
        .bucket(bucket)
        .send()
        .await
        .map_err(|e| StorageError::Bucket {
            bucket: bucket.to_string(),
            message: e.to_string(),
        })?;

    info!("Bucket {} created", bucket);
    Ok(())
}
