//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for stratus_core::AppError {
    fn from(err: StorageError) -> Self {
        stratus_core::AppError::Storage(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// User metadata attached to a stored object (`org-id`, `uploaded-by`, ...).
pub type ObjectMetadata = BTreeMap<String, String>;

/// Acknowledgement of a successful `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
}

/// Storage abstraction trait
///
/// Implementations must be safe to call concurrently from every upload worker.
///
/// **Key format:** keys are organization-scoped, see the crate root documentation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `storage_key`, overwriting any existing object.
    async fn put(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<StoredObject>;

    /// Delete a file by its storage key
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Bucket name for backends that have one.
    fn bucket(&self) -> Option<&str>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
