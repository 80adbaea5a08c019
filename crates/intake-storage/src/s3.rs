use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult, UploadProgress};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use intake_core::constants::DEFAULT_UPLOAD_CHUNK_SIZE_BYTES;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutMultipartOptions, WriteMultipart,
};

/// Smallest part S3 accepts for every part but the last.
const S3_MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// S3 storage implementation
///
/// Uploads go through S3 multipart uploads: each chunk becomes one part and
/// progress is reported once the part has been acknowledged.
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    chunk_size: usize,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            region,
            endpoint_url,
            chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE_BYTES,
        })
    }

    /// Part size for multipart uploads; clamped to the S3 minimum.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(S3_MIN_PART_SIZE);
        self
    }

    /// Multipart options carrying the object's `Content-Type`, so the public
    /// URL serves the file with its real type.
    fn upload_options(content_type: &str) -> PutMultipartOptions {
        let attributes =
            Attributes::from_iter([(Attribute::ContentType, content_type.to_string())]);
        PutMultipartOptions::from(attributes)
    }

    fn map_object_store_error(e: ObjectStoreError, transferred: u64, total: u64) -> StorageError {
        match e {
            ObjectStoreError::PermissionDenied { .. }
            | ObjectStoreError::Unauthenticated { .. } => {
                StorageError::PermissionDenied(e.to_string())
            }
            ObjectStoreError::Generic { source, .. } => StorageError::Network(source.to_string()),
            other => StorageError::Interrupted {
                transferred,
                total,
                reason: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload_resumable(
        &self,
        storage_key: &str,
        content_type: &str,
        data: Bytes,
        on_progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        let total = data.len() as u64;
        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();

        let upload = self
            .store
            .put_multipart_opts(&location, Self::upload_options(content_type))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "S3 multipart upload could not be started"
                );
                Self::map_object_store_error(e, 0, total)
            })?;

        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.chunk_size);
        let mut transferred = 0u64;
        on_progress(UploadProgress::new(0, total));

        for chunk in data.chunks(self.chunk_size) {
            writer.write(chunk);
            // Full parts are dispatched by `write`; wait until they are acknowledged.
            if let Err(e) = writer.wait_for_capacity(0).await {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    transferred_bytes = transferred,
                    size_bytes = total,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 part upload failed"
                );
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(
                        error = %abort_err,
                        key = %storage_key,
                        "Failed to abort multipart upload"
                    );
                }
                return Err(Self::map_object_store_error(e, transferred, total));
            }
            transferred += chunk.len() as u64;
            if transferred < total {
                on_progress(UploadProgress::new(transferred, total));
            }
        }

        writer.finish().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = total,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 multipart upload failed to complete"
            );
            Self::map_object_store_error(e, transferred, total)
        })?;
        on_progress(UploadProgress::new(total, total));

        let url = self.public_url(storage_key);

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = total,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(url)
    }

    /// For AWS S3: `https://{bucket}.s3.{region}.amazonaws.com/{key}`.
    /// For S3-compatible providers, path-style under the endpoint.
    fn public_url(&self, storage_key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, self.bucket, storage_key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, storage_key
            )
        }
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        self.store.delete(&location).await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
