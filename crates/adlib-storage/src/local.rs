use crate::keys::{blob_path_for, MEDIA_PREFIX};
use crate::traits::{BlobStore, StagedBlob, StorageError, StorageResult};
use adlib_core::config::is_within;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STAGING_SUFFIX: &str = ".tmp";

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Local filesystem blob store
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new LocalBlobStore rooted at the cache directory.
    ///
    /// The root and its `media/` directory are created if absent.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        let media_dir = root.join(MEDIA_PREFIX);

        fs::create_dir_all(&media_dir).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create cache directory {}: {}",
                media_dir.display(),
                e
            ))
        })?;

        Ok(LocalBlobStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a relative blob path to a filesystem path, rejecting anything
    /// that could escape the store root.
    fn blob_to_path(&self, blob_path: &str) -> StorageResult<PathBuf> {
        if blob_path.is_empty()
            || blob_path.contains("..")
            || blob_path.starts_with('/')
            || blob_path.contains('\\')
        {
            return Err(StorageError::InvalidPath(format!(
                "Blob path contains invalid characters: {}",
                blob_path
            )));
        }

        let path = self.root.join(blob_path);
        if !is_within(&self.root, &path) {
            return Err(StorageError::InvalidPath(format!(
                "Blob path resolves outside cache directory: {}",
                blob_path
            )));
        }

        Ok(path)
    }

    fn staging_path_for(blob_path: &str) -> String {
        let (dir, file) = blob_path.rsplit_once('/').unwrap_or(("", blob_path));
        let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = format!(".{}.{}.{}{}", file, std::process::id(), n, STAGING_SUFFIX);
        if dir.is_empty() {
            name
        } else {
            format!("{}/{}", dir, name)
        }
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn stage(&self, key: &str, data: &[u8], content_type: &str) -> StorageResult<StagedBlob> {
        let blob_path = blob_path_for(key, content_type);
        // Validates the key as a side effect.
        self.blob_to_path(&blob_path)?;

        let staging_path = Self::staging_path_for(&blob_path);
        let path = self.blob_to_path(&staging_path)?;

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let written = async {
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&path).await;
            return Err(StorageError::WriteFailed(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            )));
        }

        tracing::debug!(
            path = %path.display(),
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob staged"
        );

        Ok(StagedBlob {
            blob_path,
            staging_path,
            size_bytes: data.len() as u64,
        })
    }

    async fn promote(&self, staged: &StagedBlob) -> StorageResult<()> {
        let from = self.blob_to_path(&staged.staging_path)?;
        let to = self.blob_to_path(&staged.blob_path)?;

        fs::rename(&from, &to).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to move {} to {}: {}",
                from.display(),
                to.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %to.display(),
            size_bytes = staged.size_bytes,
            "Blob written"
        );

        Ok(())
    }

    async fn discard(&self, staged: &StagedBlob) -> StorageResult<()> {
        self.delete(&staged.staging_path).await
    }

    async fn read(&self, blob_path: &str) -> StorageResult<Vec<u8>> {
        let path = self.blob_to_path(blob_path)?;
        let start = std::time::Instant::now();

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(blob_path.to_string()));
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to read file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::debug!(
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Blob read"
        );

        Ok(data)
    }

    async fn delete(&self, blob_path: &str) -> StorageResult<()> {
        let path = self.blob_to_path(blob_path)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, blob_path: &str) -> StorageResult<bool> {
        let path = self.blob_to_path(blob_path)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn size(&self, blob_path: &str) -> StorageResult<u64> {
        let path = self.blob_to_path(blob_path)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(blob_path.to_string()))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn list(&self) -> StorageResult<Vec<String>> {
        let media_dir = self.root.join(MEDIA_PREFIX);
        let mut entries = match fs::read_dir(&media_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::IoError(e)),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            // Staging files are in-flight writes.
            if name.starts_with('.') {
                continue;
            }
            paths.push(format!("{}/{}", MEDIA_PREFIX, name));
        }
        paths.sort();
        Ok(paths)
    }

    fn resolve(&self, blob_path: &str) -> StorageResult<PathBuf> {
        self.blob_to_path(blob_path)
    }
}
