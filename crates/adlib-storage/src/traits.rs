//! Blob store abstraction
//!
//! This module defines the BlobStore trait implemented by the filesystem backend.

use adlib_core::AppError;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// Blob storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => {
                AppError::NotFound(format!("Cached blob missing: {}", path))
            }
            StorageError::InvalidPath(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Bytes written to a temporary file, not yet visible at `blob_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBlob {
    /// Final relative blob path
    pub blob_path: String,
    /// Relative path of the temporary file
    pub staging_path: String,
    pub size_bytes: u64,
}

/// Blob store trait
///
/// Blob paths are relative to the store root (see the crate root documentation).
/// Writes are two-phase: `stage` persists bytes to a temporary file, `promote`
/// moves them onto the final path, `discard` drops them.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stage bytes for `key`; the extension is chosen from `content_type`.
    async fn stage(&self, key: &str, data: &[u8], content_type: &str) -> StorageResult<StagedBlob>;

    /// Move a staged blob onto its final path, replacing any previous blob.
    async fn promote(&self, staged: &StagedBlob) -> StorageResult<()>;

    /// Remove a staged blob's temporary file. Idempotent.
    async fn discard(&self, staged: &StagedBlob) -> StorageResult<()>;

    /// Write bytes for `key` and return the blob path.
    async fn write(&self, key: &str, data: &[u8], content_type: &str) -> StorageResult<String> {
        let staged = self.stage(key, data, content_type).await?;
        if let Err(e) = self.promote(&staged).await {
            let _ = self.discard(&staged).await;
            return Err(e);
        }
        Ok(staged.blob_path)
    }

    /// Read a blob. Fails with `NotFound` if the file no longer exists.
    async fn read(&self, blob_path: &str) -> StorageResult<Vec<u8>>;

    /// Delete a blob. Deleting a missing blob is not an error.
    async fn delete(&self, blob_path: &str) -> StorageResult<()>;

    async fn exists(&self, blob_path: &str) -> StorageResult<bool>;

    /// Size of a blob in bytes
    async fn size(&self, blob_path: &str) -> StorageResult<u64>;

    /// Every committed blob path under the store root
    async fn list(&self) -> StorageResult<Vec<String>>;

    /// Absolute filesystem location of a blob path
    fn resolve(&self, blob_path: &str) -> StorageResult<PathBuf>;
}
