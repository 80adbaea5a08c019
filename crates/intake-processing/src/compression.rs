use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use intake_core::constants::{
    DEFAULT_COMPRESSION_MAX_DIMENSION, DEFAULT_COMPRESSION_MAX_SIZE_BYTES,
    DEFAULT_COMPRESSION_THRESHOLD_BYTES,
};
use intake_core::{format_bytes, IntakeConfig};
use std::io::Cursor;

/// JPEG qualities tried in order until the output fits the size ceiling.
const JPEG_QUALITY_STEPS: [u8; 6] = [85, 75, 65, 55, 45, 35];
/// Each downscale round shrinks both edges to this fraction.
const DOWNSCALE_FACTOR: f32 = 0.75;
const MAX_DOWNSCALE_ROUNDS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("Unsupported image type: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Compressed output is still {size} bytes (max: {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Compression worker failed: {0}")]
    Worker(String),
}

impl CompressionError {
    /// Codec failures are recovered by uploading the original file. A failure of
    /// the worker itself is not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CompressionError::Worker(_))
    }
}

/// Image encodings the compressor can re-encode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
}

impl ImageKind {
    pub fn from_mime(content_type: &str) -> Option<Self> {
        match content_type.trim().to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/webp" => Some(ImageKind::WebP),
            _ => None,
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::WebP => "image/webp",
        }
    }

    pub fn to_image_format(self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
            ImageKind::WebP => ImageFormat::WebP,
        }
    }
}

/// Compression targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Images strictly larger than this are compressed.
    pub threshold_bytes: u64,
    pub max_size_bytes: u64,
    /// Longest edge of the output, in pixels.
    pub max_dimension: u32,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_COMPRESSION_THRESHOLD_BYTES,
            max_size_bytes: DEFAULT_COMPRESSION_MAX_SIZE_BYTES,
            max_dimension: DEFAULT_COMPRESSION_MAX_DIMENSION,
        }
    }
}

impl From<&IntakeConfig> for CompressionOptions {
    fn from(config: &IntakeConfig) -> Self {
        Self {
            threshold_bytes: config.compression_threshold_bytes,
            max_size_bytes: config.compression_max_size_bytes,
            max_dimension: config.compression_max_dimension,
        }
    }
}

/// Whether a file should go through the compressor: it must be an image and
/// larger than the threshold.
pub fn should_compress(content_type: &str, size: u64, threshold_bytes: u64) -> bool {
    let is_image = content_type
        .trim()
        .to_lowercase()
        .split_once('/')
        .is_some_and(|(top, sub)| top == "image" && !sub.is_empty());
    is_image && size > threshold_bytes
}

/// Output of a successful compression.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub data: Bytes,
    pub content_type: String,
    pub original_size: u64,
    pub compressed_size: u64,
}

impl CompressedImage {
    /// "2.00 MB → 412.35 KB"
    pub fn summary(&self) -> String {
        format!(
            "{} → {}",
            format_bytes(self.original_size),
            format_bytes(self.compressed_size)
        )
    }
}

/// Pre-upload compression stage.
#[async_trait]
pub trait Compressor: Send + Sync {
    fn should_compress(&self, content_type: &str, size: u64) -> bool;

    async fn compress(
        &self,
        data: Bytes,
        content_type: &str,
    ) -> Result<CompressedImage, CompressionError>;
}

/// Main compression service
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCompressor {
    options: CompressionOptions,
}

impl ImageCompressor {
    pub fn new(options: CompressionOptions) -> Self {
        Self { options }
    }

    /// Downscale and re-encode `data`. Runs codec work on the calling thread.
    pub fn compress_blocking(
        data: &[u8],
        content_type: &str,
        options: CompressionOptions,
    ) -> Result<CompressedImage, CompressionError> {
        let kind = ImageKind::from_mime(content_type)
            .ok_or_else(|| CompressionError::UnsupportedFormat(content_type.to_string()))?;
        let original_size = data.len() as u64;

        let img = ImageReader::with_format(Cursor::new(data), kind.to_image_format())
            .decode()
            .map_err(|e| CompressionError::Decode(e.to_string()))?;

        let mut img = Self::fit_within(img, options.max_dimension);
        let mut encoded = Self::encode(&img, kind, options.max_size_bytes)?;

        let mut rounds = 0;
        while encoded.len() as u64 > options.max_size_bytes && rounds < MAX_DOWNSCALE_ROUNDS {
            let (width, height) = img.dimensions();
            let target = ((width.max(height) as f32) * DOWNSCALE_FACTOR).round() as u32;
            img = Self::fit_within(img, target.max(1));
            encoded = Self::encode(&img, kind, options.max_size_bytes)?;
            rounds += 1;
        }

        let encoded_size = encoded.len() as u64;
        if encoded_size > options.max_size_bytes {
            return Err(CompressionError::TooLarge {
                size: encoded_size,
                max: options.max_size_bytes,
            });
        }

        if encoded_size >= original_size {
            tracing::debug!(
                original_size = original_size,
                encoded_size = encoded_size,
                "Re-encoded image is not smaller; keeping the original bytes"
            );
            return Ok(CompressedImage {
                data: Bytes::copy_from_slice(data),
                content_type: kind.to_mime_type().to_string(),
                original_size,
                compressed_size: original_size,
            });
        }

        Ok(CompressedImage {
            data: Bytes::from(encoded),
            content_type: kind.to_mime_type().to_string(),
            original_size,
            compressed_size: encoded_size,
        })
    }

    /// Shrink so the longest edge is at most `max_dimension`, keeping the aspect ratio.
    fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
        let (width, height) = img.dimensions();
        if width.max(height) <= max_dimension {
            return img;
        }
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    }

    fn encode(
        img: &DynamicImage,
        kind: ImageKind,
        max_size_bytes: u64,
    ) -> Result<Vec<u8>, CompressionError> {
        match kind {
            ImageKind::Jpeg => Self::encode_jpeg(img, max_size_bytes),
            ImageKind::Png => Self::encode_png(img),
            ImageKind::WebP => Self::encode_webp(img),
        }
    }

    /// Step the quality down until the output fits, returning the last attempt
    /// when none does.
    fn encode_jpeg(img: &DynamicImage, max_size_bytes: u64) -> Result<Vec<u8>, CompressionError> {
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut last = Vec::new();

        for quality in JPEG_QUALITY_STEPS {
            let mut buffer = Vec::new();
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            rgb.write_with_encoder(encoder)
                .map_err(|e| CompressionError::Encode(e.to_string()))?;

            if buffer.len() as u64 <= max_size_bytes {
                return Ok(buffer);
            }
            last = buffer;
        }

        Ok(last)
    }

    fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, CompressionError> {
        let mut buffer = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, PngFilter::Adaptive);
        img.write_with_encoder(encoder)
            .map_err(|e| CompressionError::Encode(e.to_string()))?;
        Ok(buffer)
    }

    fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>, CompressionError> {
        let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
        let mut buffer = Vec::new();
        let encoder = WebPEncoder::new_lossless(&mut buffer);
        rgba.write_with_encoder(encoder)
            .map_err(|e| CompressionError::Encode(e.to_string()))?;
        Ok(buffer)
    }
}

#[async_trait]
impl Compressor for ImageCompressor {
    fn should_compress(&self, content_type: &str, size: u64) -> bool {
        should_compress(content_type, size, self.options.threshold_bytes)
    }

    async fn compress(
        &self,
        data: Bytes,
        content_type: &str,
    ) -> Result<CompressedImage, CompressionError> {
        let options = self.options;
        let content_type = content_type.to_string();
        let start = std::time::Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            Self::compress_blocking(&data, &content_type, options)
        })
        .await
        .map_err(|e| CompressionError::Worker(e.to_string()))?;

        if let Ok(compressed) = &result {
            tracing::debug!(
                original_size = compressed.original_size,
                compressed_size = compressed.compressed_size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Image compressed"
            );
        }

        result
    }
}
