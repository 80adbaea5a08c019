//! Shared key generation for storage backends.
//!
//! Key format: `{prefix}/{upload_timestamp_ms}_{filename}`.

use crate::traits::{StorageError, StorageResult};
use chrono::{DateTime, Utc};

const MAX_FILENAME_LEN: usize = 200;

/// Make a user-supplied file name safe to use inside a storage key.
///
/// Directory components are dropped and anything outside `[A-Za-z0-9._-]` is
/// replaced with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    if base.contains("..") {
        return "invalid_filename".to_string();
    }
    let s: String = base
        .chars()
        .take(MAX_FILENAME_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if s.trim_matches(['_', '.']).is_empty() {
        "file".to_string()
    } else {
        s
    }
}

/// Generate the storage key for a file uploaded at `uploaded_at`.
pub fn generate_storage_key(prefix: &str, uploaded_at: DateTime<Utc>, filename: &str) -> String {
    let name = format!(
        "{}_{}",
        uploaded_at.timestamp_millis(),
        sanitize_filename(filename)
    );
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// Variant `n` of `storage_key`: `-{n}` goes before the extension of the last
/// path segment, so `uploads/1_a.png` becomes `uploads/1_a-2.png`.
pub fn disambiguate_key(storage_key: &str, n: u32) -> String {
    let (dir, file) = match storage_key.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, storage_key),
    };
    let file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, n, ext),
        _ => format!("{}-{}", file, n),
    };
    match dir {
        Some(dir) => format!("{}/{}", dir, file),
        None => file,
    }
}

/// Reject keys that could escape the storage root.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            storage_key
        )));
    }
    Ok(())
}
