//! Per-file lifecycle tracking.
//!
//! A [`FileEntry`] walks `pending → compressing → uploading → done`, with
//! `compressing` and `uploading` each able to fall into `error`. `done` and
//! `error` are terminal. Every mutation goes through a transition method so the
//! url/error invariants cannot be broken from outside.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Lifecycle status of one tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Compressing,
    Uploading,
    Done,
    Error,
}

impl FileStatus {
    /// Whether `self → next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (FileStatus::Pending, FileStatus::Compressing)
                | (FileStatus::Compressing, FileStatus::Uploading)
                | (FileStatus::Compressing, FileStatus::Error)
                | (FileStatus::Uploading, FileStatus::Done)
                | (FileStatus::Uploading, FileStatus::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Done | FileStatus::Error)
    }

    /// Progress is only meaningful while a pipeline stage is running.
    pub fn is_in_flight(self) -> bool {
        matches!(self, FileStatus::Compressing | FileStatus::Uploading)
    }

    /// Badge text shown next to a file row.
    pub fn label(self) -> &'static str {
        match self {
            FileStatus::Pending => "Pending",
            FileStatus::Compressing => "Compressing",
            FileStatus::Uploading => "Uploading",
            FileStatus::Done => "Uploaded",
            FileStatus::Error => "Failed",
        }
    }
}

impl Display for FileStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileStatus::Pending => write!(f, "pending"),
            FileStatus::Compressing => write!(f, "compressing"),
            FileStatus::Uploading => write!(f, "uploading"),
            FileStatus::Done => write!(f, "done"),
            FileStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Illegal status transition for {id}: {from} -> {to}")]
pub struct TransitionError {
    pub id: String,
    pub from: FileStatus,
    pub to: FileStatus,
}

/// One selected file's tracked state.
///
/// Serialized for display only; entries are created through [`FileEntry::new`]
/// and move through the lifecycle methods.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    id: String,
    pub name: String,
    /// Original size in bytes.
    pub size: u64,
    pub content_type: String,
    status: FileStatus,
    progress: f64,
    url: Option<String>,
    error: Option<String>,
    compressed_size: Option<u64>,
}

impl FileEntry {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        size: u64,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size,
            content_type: content_type.into(),
            status: FileStatus::Pending,
            progress: 0.0,
            url: None,
            error: None,
            compressed_size: None,
        }
    }

    /// Identifier derived from the file name and the selection time, in
    /// milliseconds since the epoch.
    pub fn derive_id(name: &str, selected_at_ms: i64) -> String {
        format!("{}-{}", name, selected_at_ms)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn compressed_size(&self) -> Option<u64> {
        self.compressed_size
    }

    fn transition(&mut self, next: FileStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `pending → compressing`. Entered for every file, even when compression
    /// turns out to be a no-op.
    pub fn start_compressing(&mut self) -> Result<(), TransitionError> {
        self.transition(FileStatus::Compressing)?;
        self.progress = 0.0;
        Ok(())
    }

    /// `compressing → uploading`, recording the compressed size when the
    /// compressor actually produced output.
    pub fn start_uploading(&mut self, compressed_size: Option<u64>) -> Result<(), TransitionError> {
        self.transition(FileStatus::Uploading)?;
        self.compressed_size = compressed_size;
        self.progress = 0.0;
        Ok(())
    }

    /// Record upload progress. Ignored outside `uploading`; values lower than
    /// the current one are dropped so the displayed progress never goes back.
    pub fn record_progress(&mut self, percent: f64) -> bool {
        if self.status != FileStatus::Uploading {
            return false;
        }
        let percent = percent.clamp(0.0, 100.0);
        if percent <= self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    /// `uploading → done`. Progress is forced to 100.
    pub fn complete(&mut self, url: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(FileStatus::Done)?;
        self.url = Some(url.into());
        self.error = None;
        self.progress = 100.0;
        Ok(())
    }

    /// `compressing | uploading → error`, keeping the message verbatim.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(FileStatus::Error)?;
        self.error = Some(message.into());
        self.url = None;
        Ok(())
    }
}
