use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use thiserror::Error;
use tracing::debug;

use crate::truncate_text;

pub const DEFAULT_BUCKET: &str = "tryon-images";

/// Storage failures carry their kind on the boundary; retry policy reads the
/// tag, never the message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage bucket not configured. Please contact support.")]
    BucketMissing,
    #[error("Insufficient permissions for image upload")]
    PermissionDenied,
    #[error("Storage quota exceeded. Please try again later.")]
    QuotaExceeded,
    #[error("Upload failed: {0}")]
    Other(String),
}

impl StorageError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

#[derive(Debug, Clone)]
pub struct PutOptions {
    pub content_type: String,
    pub cache_control: String,
    pub upsert: bool,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        options: &PutOptions,
    ) -> Result<(), StorageError>;

    fn public_url(&self, key: &str) -> String;

    /// Inverse of [`ObjectStore::public_url`]; `None` when the URL does not
    /// belong to this store.
    fn key_for_url(&self, url: &str) -> Option<String>;

    async fn remove_object(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct SupabaseStorageConfig {
    pub base_url: String,
    pub bucket: String,
    pub service_key: String,
}

impl SupabaseStorageConfig {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            service_key: service_key.into(),
        }
    }
}

pub struct SupabaseStorage {
    config: SupabaseStorageConfig,
    http: reqwest::Client,
}

impl SupabaseStorage {
    pub fn new(mut config: SupabaseStorageConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn object_endpoint(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{key}",
            self.config.base_url, self.config.bucket
        )
    }

    fn public_prefix(&self) -> String {
        format!(
            "{}/storage/v1/object/public/{}/",
            self.config.base_url, self.config.bucket
        )
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        options: &PutOptions,
    ) -> Result<(), StorageError> {
        debug!(key, upsert = options.upsert, "uploading object");
        let response = self
            .http
            .post(self.object_endpoint(key))
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .header(CONTENT_TYPE, &options.content_type)
            .header(CACHE_CONTROL, &options.cache_control)
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|err| StorageError::Other(format!("transport error: {err}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_storage_status(status.as_u16(), &body))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}{key}", self.public_prefix())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_prefix())
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }

    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        let response = self
            .http
            .delete(self.object_endpoint(key))
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .send()
            .await
            .map_err(|err| StorageError::Other(format!("transport error: {err}")))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_storage_status(status.as_u16(), &body))
    }
}

fn classify_storage_status(status: u16, body: &str) -> StorageError {
    match status {
        401 | 403 => StorageError::PermissionDenied,
        404 => StorageError::BucketMissing,
        413 | 507 => StorageError::QuotaExceeded,
        status => StorageError::Other(format!("{status}: {}", truncate_text(body, 256))),
    }
}

/// Filesystem-backed store for tests and offline runs.
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalDirStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: &[u8],
        options: &PutOptions,
    ) -> Result<(), StorageError> {
        let path = self.object_path(key);
        if !options.upsert && tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::Other(format!("object already exists: {key}")));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(map_io)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(map_io)
    }

    fn public_url(&self, key: &str) -> String {
        self.object_path(key).display().to_string()
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        Path::new(url)
            .strip_prefix(&self.root)
            .ok()
            .map(|key| key.to_string_lossy().to_string())
    }

    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        tokio::fs::remove_file(self.object_path(key))
            .await
            .map_err(map_io)
    }
}

fn map_io(err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        StorageError::PermissionDenied
    } else {
        StorageError::Other(err.to_string())
    }
}
