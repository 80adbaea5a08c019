//! Shapes handed out of the pipeline: the host callback payload and the
//! per-file display row.

use super::entry::{FileEntry, FileStatus};
use crate::format::format_bytes;
use serde::{Deserialize, Serialize};

/// A successfully uploaded file, as reported to the hosting form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub original_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,
}

impl UploadedFile {
    /// Public shape of a `done` entry; `None` for anything else.
    pub fn from_entry(entry: &FileEntry) -> Option<Self> {
        if entry.status() != FileStatus::Done {
            return None;
        }
        let url = entry.url()?;
        Some(Self {
            name: entry.name.clone(),
            url: url.to_string(),
            content_type: entry.content_type.clone(),
            original_size: entry.size,
            compressed_size: entry.compressed_size(),
        })
    }
}

/// One line of the live file list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRow {
    pub id: String,
    pub name: String,
    pub size: String,
    pub status: FileStatus,
    pub badge: &'static str,
    /// Only present while a stage is running.
    pub progress: Option<f64>,
    pub error: Option<String>,
}

impl From<&FileEntry> for StatusRow {
    fn from(entry: &FileEntry) -> Self {
        let status = entry.status();
        Self {
            id: entry.id().to_string(),
            name: entry.name.clone(),
            size: format_bytes(entry.size),
            status,
            badge: status.label(),
            progress: status.is_in_flight().then(|| entry.progress()),
            error: entry.error().map(String::from),
        }
    }
}
