//! S3-backed object store for image payloads

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::{Client, presigning::PresigningConfig, primitives::ByteStream};
use bytes::Bytes;
use tracing::{debug, info};

use super::ObjectStore;
use crate::error::StoreError;
use crate::models::Asset;

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    presign_expiry: Duration,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, presign_expiry: Duration) -> Self {
        Self {
            client,
            bucket,
            presign_expiry,
        }
    }
}

/// Content type advertised for a stored name
fn content_type(stored_name: &str) -> &'static str {
    let extension = stored_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn object_error(action: &str, key: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::ObjectStore(format!("failed to {} {}: {}", action, key, err))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, stored_name: &str, data: Bytes) -> Result<(), StoreError> {
        info!("Uploading object to S3: {} ({} bytes)", stored_name, data.len());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(stored_name)
            .content_type(content_type(stored_name))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| object_error("put", stored_name, e))?;

        Ok(())
    }

    async fn delete(&self, stored_name: &str) -> Result<(), StoreError> {
        info!("Deleting object from S3: {}", stored_name);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(stored_name)
            .send()
            .await
            .map_err(|e| object_error("delete", stored_name, e))?;

        Ok(())
    }

    async fn urls(&self, assets: &[Asset]) -> Result<Vec<String>, StoreError> {
        let mut urls = Vec::with_capacity(assets.len());

        for asset in assets {
            let presigning = PresigningConfig::expires_in(self.presign_expiry)
                .map_err(|e| object_error("presign", &asset.stored_name, e))?;

            let request = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&asset.stored_name)
                .presigned(presigning)
                .await
                .map_err(|e| object_error("presign", &asset.stored_name, e))?;

            urls.push(request.uri().to_string());
        }

        Ok(urls)
    }

    async fn fetch(&self, assets: &[Asset]) -> Result<Vec<Bytes>, StoreError> {
        let mut payloads = Vec::with_capacity(assets.len());

        for asset in assets {
            let output = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&asset.stored_name)
                .send()
                .await
                .map_err(|e| object_error("get", &asset.stored_name, e))?;

            let data = output
                .body
                .collect()
                .await
                .map_err(|e| object_error("read", &asset.stored_name, e))?
                .into_bytes();

            debug!("Fetched object {} ({} bytes)", asset.stored_name, data.len());
            payloads.push(data);
        }

        Ok(payloads)
    }
}
