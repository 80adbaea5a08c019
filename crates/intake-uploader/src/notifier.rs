//! Outbound seams: the toast sink and the hosting form's callback.

use intake_core::{Toast, ToastVariant, UploadedFile};

/// Fire-and-forget sink for user-facing toasts.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Notifier that writes toasts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        match toast.variant {
            ToastVariant::Destructive => {
                tracing::warn!(title = %toast.title, "{}", toast.description)
            }
            ToastVariant::Default => {
                tracing::info!(title = %toast.title, "{}", toast.description)
            }
        }
    }
}

/// Receives the full list of successfully uploaded files every time it
/// changes: after each batch settles and after each removal.
pub trait FilesUploaded: Send + Sync {
    fn files_uploaded(&self, files: Vec<UploadedFile>);
}

impl<F> FilesUploaded for F
where
    F: Fn(Vec<UploadedFile>) + Send + Sync,
{
    fn files_uploaded(&self, files: Vec<UploadedFile>) {
        self(files)
    }
}
