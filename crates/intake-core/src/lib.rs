//! Intake Core Library
//!
//! This crate provides the domain models, the per-file state machine, the capacity
//! guard, validation rules and configuration shared by all Intake components.

pub mod capacity;
pub mod config;
pub mod constants;
pub mod format;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use capacity::{CapacityExceeded, CapacityGuard};
pub use config::IntakeConfig;
pub use format::format_bytes;
pub use models::{
    FileEntry, FileStatus, StatusRow, Toast, ToastVariant, TransitionError, UploadedFile,
};
pub use storage_types::StorageBackend;
pub use validation::{FileValidator, ValidationError};
