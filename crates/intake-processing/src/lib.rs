//! Intake Processing Library
//!
//! Pre-upload image compression. Large images are downscaled and re-encoded on
//! the blocking thread pool so the async executor is never stalled by codec work.

pub mod compression;

pub use compression::{
    should_compress, CompressedImage, CompressionError, CompressionOptions, Compressor,
    ImageCompressor, ImageKind,
};
