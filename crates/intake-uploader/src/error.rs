use intake_core::CapacityExceeded;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    CapacityExceeded(#[from] CapacityExceeded),

    #[error("No files were accepted from the selection")]
    NothingAccepted,

    #[error("Batch task failed: {0}")]
    BatchTask(String),
}
