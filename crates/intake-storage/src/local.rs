use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult, UploadProgress};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use intake_core::constants::DEFAULT_UPLOAD_CHUNK_SIZE_BYTES;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Uploads are written to `<key>.part` chunk by chunk and renamed into place
/// once complete. If a previous attempt left a partial file that is a prefix of
/// the data being uploaded, the upload resumes from its length.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    chunk_size: usize,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/intake/files")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:3000/files")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
            chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE_BYTES,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;
        Ok(self.base_path.join(storage_key))
    }

    fn part_path(path: &Path) -> PathBuf {
        let mut part = path.as_os_str().to_owned();
        part.push(".part");
        PathBuf::from(part)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Length of a usable partial upload, or 0 when there is nothing to resume.
    async fn resume_offset(part_path: &Path, data: &[u8]) -> u64 {
        let existing = match fs::read(part_path).await {
            Ok(existing) => existing,
            Err(_) => return 0,
        };

        if existing.len() <= data.len() && data.starts_with(&existing) {
            existing.len() as u64
        } else {
            tracing::warn!(
                path = %part_path.display(),
                partial_bytes = existing.len(),
                "Discarding partial upload that does not match the data"
            );
            0
        }
    }

    fn map_io_error(e: std::io::Error, path: &Path, transferred: u64, total: u64) -> StorageError {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                StorageError::PermissionDenied(format!("{}: {}", path.display(), e))
            }
            _ => StorageError::Interrupted {
                transferred,
                total,
                reason: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_resumable(
        &self,
        storage_key: &str,
        _content_type: &str,
        data: Bytes,
        on_progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let part_path = Self::part_path(&path);
        let total = data.len() as u64;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        let mut offset = Self::resume_offset(&part_path, &data).await;
        if offset > 0 {
            tracing::info!(
                key = %storage_key,
                resumed_at = offset,
                size_bytes = total,
                "Resuming local upload"
            );
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(offset > 0)
            .truncate(offset == 0)
            .open(&part_path)
            .await
            .map_err(|e| Self::map_io_error(e, &part_path, offset, total))?;

        on_progress(UploadProgress::new(offset, total));

        while offset < total {
            let end = (offset + self.chunk_size as u64).min(total);
            let chunk = data.slice(offset as usize..end as usize);

            file.write_all(&chunk)
                .await
                .map_err(|e| Self::map_io_error(e, &part_path, offset, total))?;
            file.flush()
                .await
                .map_err(|e| Self::map_io_error(e, &part_path, offset, total))?;

            offset = end;
            on_progress(UploadProgress::new(offset, total));
        }

        file.sync_all()
            .await
            .map_err(|e| Self::map_io_error(e, &part_path, offset, total))?;
        drop(file);

        fs::rename(&part_path, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to move {} into place: {}",
                part_path.display(),
                e
            ))
        })?;

        let url = self.public_url(storage_key);

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = total,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(url)
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), storage_key)
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            "Local storage delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
