#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use intake_core::{IntakeConfig, Toast, UploadedFile};
use intake_processing::{CompressedImage, CompressionError, Compressor, ImageCompressor};
use intake_storage::{Storage, StorageBackend, StorageError, StorageResult, UploadProgress};
use intake_uploader::{FilesUploaded, Notifier, SelectedFile, Uploader};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const BASE_URL: &str = "https://files.test";

/// In-memory storage. Uploads for file names registered with `fail_on` reject
/// with the given message; uploads for names registered with `hold` wait until
/// the returned `Notify` is signalled.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    failures: Mutex<HashMap<String, String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MemoryStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_on(&self, file_name: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(file_name.to_string(), message.to_string());
    }

    pub fn hold(&self, file_name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(file_name.to_string(), gate.clone());
        gate
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Bytes stored for the object whose key ends with `_{file_name}`.
    pub fn stored(&self, file_name: &str) -> Option<Bytes> {
        self.find(file_name).map(|(data, _)| data)
    }

    /// Content type the object for `file_name` was uploaded with.
    pub fn content_type(&self, file_name: &str) -> Option<String> {
        self.find(file_name).map(|(_, content_type)| content_type)
    }

    fn find(&self, file_name: &str) -> Option<(Bytes, String)> {
        let suffix = format!("_{}", file_name);
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(key, _)| key.ends_with(&suffix))
            .map(|(_, object)| object.clone())
    }

    fn file_name(key: &str) -> &str {
        let base = key.rsplit('/').next().unwrap_or(key);
        base.split_once('_').map(|(_, name)| name).unwrap_or(base)
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload_resumable(
        &self,
        storage_key: &str,
        content_type: &str,
        data: Bytes,
        on_progress: &(dyn Fn(UploadProgress) + Send + Sync),
    ) -> StorageResult<String> {
        let name = Self::file_name(storage_key).to_string();
        let total = data.len() as u64;
        on_progress(UploadProgress::new(0, total));
        on_progress(UploadProgress::new(total / 2, total));

        let gate = self.gates.lock().unwrap().get(&name).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failure = self.failures.lock().unwrap().get(&name).cloned();
        if let Some(message) = failure {
            return Err(StorageError::Network(message));
        }

        self.objects
            .lock()
            .unwrap()
            .insert(storage_key.to_string(), (data, content_type.to_string()));
        on_progress(UploadProgress::new(total, total));
        Ok(self.public_url(storage_key))
    }

    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", BASE_URL, storage_key)
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().unwrap().contains_key(storage_key))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(storage_key);
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().unwrap().clone()
    }

    pub fn destructive(&self) -> Vec<Toast> {
        self.toasts()
            .into_iter()
            .filter(|t| t.is_destructive())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().unwrap().push(toast);
    }
}

/// Records every list handed to the host.
#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<Vec<UploadedFile>>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Vec<UploadedFile>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Vec<UploadedFile>> {
        self.calls.lock().unwrap().last().cloned()
    }
}

impl FilesUploaded for RecordingHost {
    fn files_uploaded(&self, files: Vec<UploadedFile>) {
        self.calls.lock().unwrap().push(files);
    }
}

/// Wraps a compressor and counts how often `compress` is called.
pub struct CountingCompressor<C> {
    inner: C,
    calls: AtomicUsize,
}

impl<C: Compressor> CountingCompressor<C> {
    pub fn new(inner: C) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Compressor> Compressor for CountingCompressor<C> {
    fn should_compress(&self, content_type: &str, size: u64) -> bool {
        self.inner.should_compress(content_type, size)
    }

    async fn compress(
        &self,
        data: Bytes,
        content_type: &str,
    ) -> Result<CompressedImage, CompressionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compress(data, content_type).await
    }
}

/// Compressor that accepts the usual inputs and then fails with `error`.
pub struct FailingCompressor {
    error: fn() -> CompressionError,
}

impl FailingCompressor {
    pub fn decode_error() -> Self {
        Self {
            error: || CompressionError::Decode("corrupt image data".to_string()),
        }
    }

    pub fn worker_crash() -> Self {
        Self {
            error: || CompressionError::Worker("task panicked".to_string()),
        }
    }
}

#[async_trait]
impl Compressor for FailingCompressor {
    fn should_compress(&self, content_type: &str, size: u64) -> bool {
        ImageCompressor::default().should_compress(content_type, size)
    }

    async fn compress(
        &self,
        _data: Bytes,
        _content_type: &str,
    ) -> Result<CompressedImage, CompressionError> {
        Err((self.error)())
    }
}

/// Compressor that answers every image with a fixed result.
pub struct StaticCompressor {
    result: CompressedImage,
}

impl StaticCompressor {
    pub fn new(data: &'static [u8], content_type: &str, original_size: u64) -> Arc<Self> {
        Arc::new(Self {
            result: CompressedImage {
                data: Bytes::from_static(data),
                content_type: content_type.to_string(),
                original_size,
                compressed_size: data.len() as u64,
            },
        })
    }
}

#[async_trait]
impl Compressor for StaticCompressor {
    fn should_compress(&self, content_type: &str, _size: u64) -> bool {
        content_type.starts_with("image/")
    }

    async fn compress(
        &self,
        _data: Bytes,
        _content_type: &str,
    ) -> Result<CompressedImage, CompressionError> {
        Ok(self.result.clone())
    }
}

pub fn config(max_files: usize) -> IntakeConfig {
    IntakeConfig {
        max_files,
        ..IntakeConfig::default()
    }
}

pub fn uploader(
    config: &IntakeConfig,
    storage: Arc<dyn Storage>,
    compressor: Arc<dyn Compressor>,
    notifier: Arc<RecordingNotifier>,
    host: Arc<RecordingHost>,
) -> Uploader {
    Uploader::new(config, storage, compressor, notifier, host)
}

pub fn text_file(name: &str, len: usize) -> SelectedFile {
    SelectedFile::new(name, "text/plain", vec![b'x'; len])
}

/// Noisy JPEG, large enough to cross the default compression threshold.
pub fn noisy_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut seed: u32 = 0x2545_f491;
    let img = image::RgbImage::from_fn(width, height, |_, _| {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        let [r, g, b, _] = seed.to_le_bytes();
        image::Rgb([r, g, b])
    });
    let mut out = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 95);
    img.write_with_encoder(encoder).unwrap();
    out.into_inner()
}
