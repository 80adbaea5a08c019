//! Intake Storage Library
//!
//! Resumable upload transport for Intake. It defines the [`Storage`] trait and
//! its S3 and local filesystem implementations.
//!
//! # Storage key format
//!
//! Every uploaded object lives under one logical prefix and is named after the
//! upload time and the original file name:
//!
//! - `{prefix}/{upload_timestamp_ms}_{filename}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in
//! the `keys` module so all backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use intake_core::StorageBackend;
pub use keys::{disambiguate_key, generate_storage_key, sanitize_filename};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult, UploadProgress};
