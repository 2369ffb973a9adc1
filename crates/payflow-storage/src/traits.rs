//! Storage abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use payflow_core::models::TenantKeys;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Where an upload landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Backend-relative key, used for later download or delete
    pub key: String,
    /// Location recorded on the file row
    pub path: String,
    pub size_bytes: u64,
}

/// Raw file storage for uploaded batches.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` as `filename` under `folder`, scoped to the tenant.
    async fn upload(
        &self,
        tenant: &TenantKeys,
        folder: &str,
        filename: &str,
        data: Bytes,
    ) -> StorageResult<StoredObject>;

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;
}
