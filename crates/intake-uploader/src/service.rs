//! Batch upload service
//!
//! Orchestrates a selection through the whole workflow:
//! capacity check → validate → track → (compress → upload) per file → join → aggregate → notify host

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use intake_core::{CapacityGuard, FileEntry, FileValidator, IntakeConfig, StatusRow, UploadedFile};
use intake_processing::Compressor;
use intake_storage::Storage;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::batch::BatchSnapshot;
use crate::error::UploadError;
use crate::notifier::{FilesUploaded, Notifier};
use crate::pipeline::{run_entry, PipelineContext};
use crate::types::{BatchReport, SelectedFile};

/// Multi-file uploader
///
/// Owns one batch of tracked entries. Cloning is cheap and every clone
/// operates on the same batch.
#[derive(Clone)]
pub struct Uploader {
    inner: Arc<UploaderInner>,
}

struct UploaderInner {
    ctx: Arc<PipelineContext>,
    guard: CapacityGuard,
    validator: FileValidator,
    on_files_uploaded: Arc<dyn FilesUploaded>,
}

/// A selection whose pipelines are running.
#[derive(Debug)]
pub struct BatchHandle {
    ids: Vec<String>,
    task: JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// Ids of the entries created for this selection, in selection order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Wait until every entry of the selection has settled and the host has
    /// been handed the aggregated result.
    pub async fn wait(self) -> Result<BatchReport, UploadError> {
        self.task
            .await
            .map_err(|e| UploadError::BatchTask(e.to_string()))
    }
}

impl Uploader {
    /// Create an uploader
    ///
    /// Capacity, validation rules and the storage prefix come from `config`;
    /// everything that talks to the outside world is injected.
    pub fn new(
        config: &IntakeConfig,
        storage: Arc<dyn Storage>,
        compressor: Arc<dyn Compressor>,
        notifier: Arc<dyn Notifier>,
        on_files_uploaded: Arc<dyn FilesUploaded>,
    ) -> Self {
        let ctx = PipelineContext {
            batch: Default::default(),
            storage,
            compressor,
            notifier,
            storage_prefix: config.storage_prefix.clone(),
            issued_keys: Default::default(),
        };

        Self {
            inner: Arc::new(UploaderInner {
                ctx: Arc::new(ctx),
                guard: CapacityGuard::new(config.max_files),
                validator: config.file_validator(),
                on_files_uploaded,
            }),
        }
    }

    pub fn max_files(&self) -> usize {
        self.inner.guard.max_files()
    }

    /// Accept a selection and start uploading it.
    ///
    /// The whole selection is rejected when it does not fit into the batch.
    /// Files failing validation are dropped one by one, each with its own
    /// toast. Entries for the remaining files are created before this returns;
    /// their pipelines run on a spawned task, so this must be called from
    /// within a Tokio runtime.
    pub fn select_files(&self, files: Vec<SelectedFile>) -> Result<BatchHandle, UploadError> {
        let inner = &self.inner;
        let selected_at = Utc::now().timestamp_millis();
        let mut toasts = Vec::new();

        let accepted = inner.ctx.batch.insert_with(|current| {
            if let Err(rejected) = inner.guard.check(current.len(), files.len()) {
                return (Vec::new(), Err(rejected));
            }

            let mut taken: HashSet<String> = current.iter().map(|e| e.id().to_string()).collect();
            let mut entries = Vec::new();
            let mut accepted = Vec::new();

            for file in files {
                if let Err(e) = inner
                    .validator
                    .validate(&file.name, &file.content_type, file.size())
                {
                    tracing::info!(error = %e, "Rejected selected file");
                    toasts.push(e.toast());
                    continue;
                }

                let id = unique_id(&file.name, selected_at, &taken);
                taken.insert(id.clone());
                entries.push(FileEntry::new(
                    id.clone(),
                    file.name.clone(),
                    file.size(),
                    file.content_type.clone(),
                ));
                accepted.push((id, file));
            }

            (entries, Ok(accepted))
        });

        let accepted = match accepted {
            Ok(accepted) => accepted,
            Err(rejected) => {
                tracing::warn!(
                    current = rejected.current,
                    incoming = rejected.incoming,
                    max_files = rejected.max_files,
                    "Selection rejected by capacity guard"
                );
                inner.ctx.notifier.notify(rejected.toast());
                return Err(rejected.into());
            }
        };

        for toast in toasts {
            inner.ctx.notifier.notify(toast);
        }

        if accepted.is_empty() {
            return Err(UploadError::NothingAccepted);
        }

        tracing::info!(files = accepted.len(), "Starting batch upload");

        let ids = accepted.iter().map(|(id, _)| id.clone()).collect();
        let uploader = self.clone();
        let task = tokio::spawn(async move {
            let ctx = uploader.inner.ctx.clone();
            let outcomes = join_all(
                accepted
                    .into_iter()
                    .map(|(id, file)| run_entry(ctx.clone(), id, file)),
            )
            .await;

            let report = BatchReport::from_outcomes(outcomes);
            tracing::info!(
                done = report.done.len(),
                failed = report.failed.len(),
                vanished = report.vanished.len(),
                "Batch settled"
            );
            uploader.publish();
            report
        });

        Ok(BatchHandle { ids, task })
    }

    /// Stop tracking an entry and republish the aggregate right away.
    ///
    /// Work still running for the entry is not interrupted; whatever it
    /// reports later is ignored. Returns `false` if the id was not tracked.
    pub fn remove(&self, id: &str) -> bool {
        match self.inner.ctx.batch.remove(id) {
            Some(entry) => {
                tracing::info!(entry_id = %id, status = %entry.status(), "Removed entry");
                self.publish();
                true
            }
            None => false,
        }
    }

    /// Successfully uploaded files in the current snapshot, in batch order.
    pub fn aggregate(&self) -> Vec<UploadedFile> {
        aggregate(&self.inner.ctx.batch.snapshot())
    }

    pub fn entries(&self) -> BatchSnapshot {
        self.inner.ctx.batch.snapshot()
    }

    pub fn entry(&self, id: &str) -> Option<FileEntry> {
        self.inner.ctx.batch.get(id)
    }

    pub fn status_rows(&self) -> Vec<StatusRow> {
        self.entries().iter().map(StatusRow::from).collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchSnapshot> {
        self.inner.ctx.batch.subscribe()
    }

    fn publish(&self) {
        let files = self.aggregate();
        tracing::debug!(files = files.len(), "Publishing uploaded files");
        self.inner.on_files_uploaded.files_uploaded(files);
    }
}

fn aggregate(entries: &[FileEntry]) -> Vec<UploadedFile> {
    entries.iter().filter_map(UploadedFile::from_entry).collect()
}

/// `name-timestamp`, suffixed with `-2`, `-3`, ... while the id is taken.
fn unique_id(name: &str, selected_at_ms: i64, taken: &HashSet<String>) -> String {
    let base = FileEntry::derive_id(name, selected_at_ms);
    if !taken.contains(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}
