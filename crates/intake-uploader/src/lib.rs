//! Intake Uploader Library
//!
//! Batch orchestration for multi-file uploads. A selection passes the capacity
//! guard, becomes one tracked entry per file, and every entry then runs its own
//! compress-then-upload pipeline concurrently with its siblings. Once all of
//! them settle, the successful uploads are aggregated and handed to the host.

pub mod batch;
pub mod error;
pub mod notifier;
mod pipeline;
pub mod service;
pub mod types;

pub use batch::{Batch, BatchSnapshot, EntryUpdate};
pub use error::UploadError;
pub use notifier::{FilesUploaded, Notifier, TracingNotifier};
pub use service::{BatchHandle, Uploader};
pub use types::{BatchReport, EntryOutcome, SelectedFile};
