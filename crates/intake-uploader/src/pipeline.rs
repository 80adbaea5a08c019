//! One entry's compress-then-upload run.

use crate::batch::{Batch, EntryUpdate};
use crate::notifier::Notifier;
use crate::types::{EntryOutcome, SelectedFile};
use bytes::Bytes;
use chrono::Utc;
use intake_core::{FileEntry, Toast, TransitionError};
use intake_processing::Compressor;
use intake_storage::{disambiguate_key, generate_storage_key, Storage, UploadProgress};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Collaborators shared by every pipeline of an uploader.
pub(crate) struct PipelineContext {
    pub batch: Batch,
    pub storage: Arc<dyn Storage>,
    pub compressor: Arc<dyn Compressor>,
    pub notifier: Arc<dyn Notifier>,
    pub storage_prefix: String,
    /// Every key handed out by this uploader.
    pub issued_keys: Mutex<HashSet<String>>,
}

/// What goes over the wire for one entry.
struct Prepared {
    data: Bytes,
    content_type: String,
    compressed_size: Option<u64>,
}

impl PipelineContext {
    /// Apply a lifecycle transition to `id`. Illegal transitions are logged and
    /// leave the entry untouched.
    fn transition(
        &self,
        id: &str,
        change: impl FnOnce(&mut FileEntry) -> Result<(), TransitionError>,
    ) -> EntryUpdate {
        let update = self.batch.update(id, |entry| match change(entry) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(entry_id = %id, error = %e, "Rejected illegal transition");
                false
            }
        });
        if update == EntryUpdate::Vanished {
            tracing::debug!(entry_id = %id, "Entry removed; dropping state change");
        }
        update
    }

    /// Storage key for `file_name`, unique among the keys this uploader has
    /// issued. Same-named files selected in the same millisecond get `-2`,
    /// `-3`, ... variants.
    fn reserve_key(&self, file_name: &str) -> String {
        let base = generate_storage_key(&self.storage_prefix, Utc::now(), file_name);
        let mut issued = self
            .issued_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut key = base.clone();
        let mut n = 2;
        while issued.contains(&key) {
            key = disambiguate_key(&base, n);
            n += 1;
        }
        issued.insert(key.clone());
        key
    }

    /// Run the compression stage. `Err` carries the message of a failure the
    /// stage cannot recover from.
    async fn compress(&self, id: &str, file: &SelectedFile) -> Result<Prepared, String> {
        let size = file.size();
        let original = Prepared {
            data: file.data.clone(),
            content_type: file.content_type.clone(),
            compressed_size: None,
        };
        if !self.compressor.should_compress(&file.content_type, size) {
            return Ok(original);
        }

        match self
            .compressor
            .compress(file.data.clone(), &file.content_type)
            .await
        {
            Ok(compressed) => {
                tracing::info!(
                    entry_id = %id,
                    original_size = compressed.original_size,
                    compressed_size = compressed.compressed_size,
                    "Image compressed before upload"
                );
                if compressed.compressed_size < compressed.original_size {
                    self.notifier.notify(Toast::info(
                        "Image compressed",
                        format!("{}: {}", file.name, compressed.summary()),
                    ));
                }
                Ok(Prepared {
                    compressed_size: Some(compressed.compressed_size),
                    content_type: compressed.content_type,
                    data: compressed.data,
                })
            }
            Err(e) if e.is_recoverable() => {
                tracing::warn!(
                    entry_id = %id,
                    error = %e,
                    size_bytes = size,
                    "Compression failed; uploading original file"
                );
                Ok(original)
            }
            Err(e) => {
                tracing::error!(entry_id = %id, error = %e, "Compression stage failed");
                Err(e.to_string())
            }
        }
    }
}

/// Drive one entry from `pending` to a terminal state.
///
/// Removal of the entry does not stop the run; state changes for a removed
/// entry are simply dropped.
pub(crate) async fn run_entry(
    ctx: Arc<PipelineContext>,
    id: String,
    file: SelectedFile,
) -> EntryOutcome {
    let start = std::time::Instant::now();
    ctx.transition(&id, |e| e.start_compressing());

    let prepared = match ctx.compress(&id, &file).await {
        Ok(prepared) => prepared,
        Err(message) => {
            return match ctx.transition(&id, |e| e.fail(message.clone())) {
                EntryUpdate::Vanished => EntryOutcome::Vanished { id },
                _ => EntryOutcome::Failed { id, error: message },
            };
        }
    };

    ctx.transition(&id, |e| e.start_uploading(prepared.compressed_size));

    let key = ctx.reserve_key(&file.name);
    let batch = &ctx.batch;
    let on_progress = |progress: UploadProgress| {
        batch.update(&id, |e| e.record_progress(progress.percent()));
    };

    let result = ctx
        .storage
        .upload_resumable(&key, &prepared.content_type, prepared.data, &on_progress)
        .await;

    match result {
        Ok(url) => {
            tracing::info!(
                entry_id = %id,
                key = %key,
                size_bytes = file.size(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "File uploaded"
            );
            match ctx.transition(&id, |e| e.complete(url.clone())) {
                EntryUpdate::Vanished => EntryOutcome::Vanished { id },
                _ => EntryOutcome::Done { id, url },
            }
        }
        Err(e) => {
            let message = e.to_string();
            tracing::error!(
                entry_id = %id,
                key = %key,
                error = %message,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "File upload failed"
            );
            match ctx.transition(&id, |e| e.fail(message.clone())) {
                EntryUpdate::Vanished => EntryOutcome::Vanished { id },
                _ => EntryOutcome::Failed { id, error: message },
            }
        }
    }
}
