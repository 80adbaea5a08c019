pub mod entry;
pub mod toast;
pub mod uploaded;

pub use entry::{FileEntry, FileStatus, TransitionError};
pub use toast::{Toast, ToastVariant};
pub use uploaded::{StatusRow, UploadedFile};
