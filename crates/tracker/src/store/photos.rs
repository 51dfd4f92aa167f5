//! Photo blob storage.
//!
//! Photos live under `<category>/<id>.jpg` and are resolved to a retrievable
//! URL on demand. In S3 the URL is a presigned GET.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{BackendError, PhotoStore};

/// Photos kept in an S3 bucket.
#[derive(Clone)]
pub struct S3PhotoStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    url_ttl: Duration,
}

impl S3PhotoStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, url_ttl: Duration) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            url_ttl,
        }
    }
}

#[async_trait]
impl PhotoStore for S3PhotoStore {
    async fn put_photo(&self, key: &str, body: Bytes) -> Result<(), BackendError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("image/jpeg")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| BackendError::Request(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    async fn photo_url(&self, key: &str) -> Result<Option<String>, BackendError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => {}
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => return Ok(None),
            Err(e) => return Err(BackendError::Request(DisplayErrorContext(&e).to_string())),
        }

        let presigning = PresigningConfig::expires_in(self.url_ttl)
            .map_err(|e| BackendError::Request(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| BackendError::Request(DisplayErrorContext(&e).to_string()))?;

        Ok(Some(request.uri().to_string()))
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

/// Photos kept in process memory, addressed as `memory://<key>`.
#[derive(Debug, Clone, Default)]
pub struct MemoryPhotoStore {
    blobs: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn blob(&self, key: &str) -> Option<Bytes> {
        self.blobs.read().await.get(key).cloned()
    }
}

#[async_trait]
impl PhotoStore for MemoryPhotoStore {
    async fn put_photo(&self, key: &str, body: Bytes) -> Result<(), BackendError> {
        self.blobs.write().await.insert(key.to_owned(), body);
        Ok(())
    }

    async fn photo_url(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self
            .blobs
            .read()
            .await
            .contains_key(key)
            .then(|| format!("memory://{key}")))
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
