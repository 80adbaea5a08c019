//! Defaults for the ingestion pipeline.

/// Maximum number of files tracked by one uploader instance.
pub const DEFAULT_MAX_FILES: usize = 10;

/// Images strictly larger than this are compressed before upload.
pub const DEFAULT_COMPRESSION_THRESHOLD_BYTES: u64 = 500 * 1024;

/// Ceiling for the compressor's output.
pub const DEFAULT_COMPRESSION_MAX_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// Longest edge of a compressed image, in pixels.
pub const DEFAULT_COMPRESSION_MAX_DIMENSION: u32 = 1920;

/// Chunk size used by resumable uploads.
pub const DEFAULT_UPLOAD_CHUNK_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// Logical prefix every uploaded object lives under.
pub const DEFAULT_STORAGE_PREFIX: &str = "uploads";
