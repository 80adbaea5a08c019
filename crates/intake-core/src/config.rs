//! Configuration module
//!
//! Settings for the ingestion pipeline and the storage backend, read from the
//! environment (and `.env` when present).

use std::env;
use std::str::FromStr;

use anyhow::Context;

use crate::constants::{
    DEFAULT_COMPRESSION_MAX_DIMENSION, DEFAULT_COMPRESSION_MAX_SIZE_BYTES,
    DEFAULT_COMPRESSION_THRESHOLD_BYTES, DEFAULT_MAX_FILES, DEFAULT_STORAGE_PREFIX,
    DEFAULT_UPLOAD_CHUNK_SIZE_BYTES,
};
use crate::storage_types::StorageBackend;
use crate::validation::FileValidator;

const MB: u64 = 1024 * 1024;

/// Application configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct IntakeConfig {
    // Batch limits
    pub max_files: usize,
    pub max_file_size_bytes: Option<u64>,
    pub accepted_content_types: Vec<String>,
    // Compression
    pub compression_threshold_bytes: u64,
    pub compression_max_size_bytes: u64,
    pub compression_max_dimension: u32,
    // Transport
    pub storage_prefix: String,
    pub upload_chunk_size_bytes: usize,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, etc.)
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_size_bytes: None,
            accepted_content_types: Vec::new(),
            compression_threshold_bytes: DEFAULT_COMPRESSION_THRESHOLD_BYTES,
            compression_max_size_bytes: DEFAULT_COMPRESSION_MAX_SIZE_BYTES,
            compression_max_dimension: DEFAULT_COMPRESSION_MAX_DIMENSION,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            upload_chunk_size_bytes: DEFAULT_UPLOAD_CHUNK_SIZE_BYTES,
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: None,
            local_storage_base_url: None,
        }
    }
}

impl IntakeConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded environment file");
        }
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        tracing::debug!(
            backend = %config.storage_backend,
            max_files = config.max_files,
            "Loaded intake configuration"
        );
        Ok(config)
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let max_files = match var("INTAKE_MAX_FILES") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("INTAKE_MAX_FILES must be a positive integer"))?,
            None => defaults.max_files,
        };

        let max_file_size_bytes = parse_var::<u64>(&var, "INTAKE_MAX_FILE_SIZE_MB")?
            .map(|mb| scale(mb, MB, "INTAKE_MAX_FILE_SIZE_MB"))
            .transpose()?;

        let accepted_content_types = var("INTAKE_ACCEPTED_CONTENT_TYPES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let compression_threshold_bytes = parse_var::<u64>(&var, "COMPRESSION_THRESHOLD_KB")?
            .map(|kb| scale(kb, 1024, "COMPRESSION_THRESHOLD_KB"))
            .transpose()?
            .unwrap_or(defaults.compression_threshold_bytes);

        let compression_max_size_bytes = parse_var::<u64>(&var, "COMPRESSION_MAX_SIZE_MB")?
            .map(|mb| scale(mb, MB, "COMPRESSION_MAX_SIZE_MB"))
            .transpose()?
            .unwrap_or(defaults.compression_max_size_bytes);

        let compression_max_dimension = parse_var::<u32>(&var, "COMPRESSION_MAX_DIMENSION")?
            .unwrap_or(defaults.compression_max_dimension);

        let upload_chunk_size_bytes = parse_var::<usize>(&var, "UPLOAD_CHUNK_SIZE_BYTES")?
            .unwrap_or(defaults.upload_chunk_size_bytes);

        let storage_prefix = var("INTAKE_STORAGE_PREFIX")
            .map(|p| p.trim_matches('/').to_string())
            .unwrap_or(defaults.storage_prefix);

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(v) => v.parse::<StorageBackend>()?,
            None => defaults.storage_backend,
        };

        let config = Self {
            max_files,
            max_file_size_bytes,
            accepted_content_types,
            compression_threshold_bytes,
            compression_max_size_bytes,
            compression_max_dimension,
            storage_prefix,
            upload_chunk_size_bytes,
            storage_backend,
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION").or_else(|| var("AWS_REGION")),
            s3_endpoint: var("S3_ENDPOINT"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_files == 0 {
            return Err(anyhow::anyhow!("INTAKE_MAX_FILES must be at least 1"));
        }

        if self.upload_chunk_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_CHUNK_SIZE_BYTES must be greater than 0"
            ));
        }

        if self.compression_max_dimension == 0 {
            return Err(anyhow::anyhow!(
                "COMPRESSION_MAX_DIMENSION must be greater than 0"
            ));
        }

        if self.storage_prefix.contains("..") {
            return Err(anyhow::anyhow!("INTAKE_STORAGE_PREFIX must not contain '..'"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BACKEND=s3 requires S3_BUCKET to be set"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BACKEND=s3 requires S3_REGION or AWS_REGION to be set"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() || self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "STORAGE_BACKEND=local requires LOCAL_STORAGE_PATH and LOCAL_STORAGE_BASE_URL to be set"
                    ));
                }
            }
        }

        Ok(())
    }

    /// Validator built from the batch limits.
    pub fn file_validator(&self) -> FileValidator {
        FileValidator::new(self.max_file_size_bytes, self.accepted_content_types.clone())
    }
}

/// Parse an optional numeric variable; a value that does not parse is an error.
fn parse_var<T>(var: impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|v| {
            v.parse::<T>()
                .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, v))
        })
        .transpose()
}

fn scale(value: u64, unit: u64, key: &str) -> anyhow::Result<u64> {
    value
        .checked_mul(unit)
        .with_context(|| format!("{} is too large", key))
}
