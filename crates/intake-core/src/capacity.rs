//! Capacity guard for file selections.
//!
//! Decides whether a new selection fits into the batch. A selection that does
//! not fit is rejected as a whole; partial acceptance is not supported. Only
//! currently tracked entries count against the limit.

use crate::constants::DEFAULT_MAX_FILES;
use crate::models::Toast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Cannot add {incoming} file(s) to a batch of {current}: at most {max_files} files are allowed")]
pub struct CapacityExceeded {
    pub current: usize,
    pub incoming: usize,
    pub max_files: usize,
}

impl CapacityExceeded {
    /// Notification shown to the user when a selection is rejected.
    pub fn toast(&self) -> Toast {
        Toast::destructive(
            "Too many files",
            format!("You can upload a maximum of {} files.", self.max_files),
        )
    }
}

/// Gate that determines whether a selection can join the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityGuard {
    max_files: usize,
}

impl Default for CapacityGuard {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl CapacityGuard {
    /// `max_files` of zero is treated as one; a form always accepts at least
    /// one file.
    pub fn new(max_files: usize) -> Self {
        Self {
            max_files: max_files.max(1),
        }
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Accept or reject `incoming` new files given `current` tracked ones.
    pub fn check(&self, current: usize, incoming: usize) -> Result<(), CapacityExceeded> {
        if current.saturating_add(incoming) > self.max_files {
            return Err(CapacityExceeded {
                current,
                incoming,
                max_files: self.max_files,
            });
        }
        Ok(())
    }
}
