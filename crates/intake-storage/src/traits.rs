//! Storage abstraction trait
//!
//! This module defines the Storage trait that all upload backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Upload interrupted after {transferred} of {total} bytes: {reason}")]
    Interrupted {
        transferred: u64,
        total: u64,
        reason: String,
    },

    /// Transport failure reported by the backend; the message is shown as-is.
    #[error("{0}")]
    Network(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Progress of a single upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn new(bytes_transferred: u64, total_bytes: u64) -> Self {
        Self {
            bytes_transferred,
            total_bytes,
        }
    }

    /// `bytes_transferred / total_bytes * 100`; an empty upload counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Storage abstraction trait
///
/// All backends (S3, local filesystem) implement this trait so the uploader can
/// work with any of them, and tests can substitute an in-memory fake.
///
/// **Key format:** `{prefix}/{upload_timestamp_ms}_{filename}`. See the crate
/// root documentation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload `data` under `storage_key` in chunks and return its public URL.
    ///
    /// `on_progress` is invoked after every acknowledged chunk. Backends that can
    /// pick up an interrupted upload resume from the last acknowledged offset.
    async fn upload_resumable(
        &self,
        storage_key: &str,
        content_type: &str,
        data: Bytes,
        on_progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> StorageResult<String>;

    /// Publicly fetchable URL of an object.
    fn public_url(&self, storage_key: &str) -> String;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Delete an object by its storage key
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
