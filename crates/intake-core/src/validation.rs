//! Per-file validation applied to a selection before entries are created.

use crate::format::format_bytes;
use crate::models::Toast;

/// Validation errors for selected files
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{name} is too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("{name} has an unsupported type: {content_type} (accepted: {accepted:?})")]
    InvalidContentType {
        name: String,
        content_type: String,
        accepted: Vec<String>,
    },
}

impl ValidationError {
    pub fn toast(&self) -> Toast {
        let description = match self {
            ValidationError::FileTooLarge { name, max, .. } => {
                format!("{} exceeds the {} limit.", name, format_bytes(*max))
            }
            ValidationError::InvalidContentType {
                name, content_type, ..
            } => format!("{} ({}) is not an accepted file type.", name, content_type),
        };
        Toast::destructive("File rejected", description)
    }
}

/// Selection validator
///
/// Accepted types are exact MIME types (`application/pdf`) or wildcards
/// (`image/*`). An empty list accepts every type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileValidator {
    max_file_size: Option<u64>,
    accepted_content_types: Vec<String>,
}

impl FileValidator {
    pub fn new(max_file_size: Option<u64>, accepted_content_types: Vec<String>) -> Self {
        Self {
            max_file_size,
            accepted_content_types: accepted_content_types
                .into_iter()
                .map(|ct| ct.trim().to_lowercase())
                .filter(|ct| !ct.is_empty())
                .collect(),
        }
    }

    pub fn validate_size(&self, name: &str, size: u64) -> Result<(), ValidationError> {
        if let Some(max) = self.max_file_size {
            if size > max {
                return Err(ValidationError::FileTooLarge {
                    name: name.to_string(),
                    size,
                    max,
                });
            }
        }

        Ok(())
    }

    pub fn validate_content_type(
        &self,
        name: &str,
        content_type: &str,
    ) -> Result<(), ValidationError> {
        if self.accepted_content_types.is_empty() {
            return Ok(());
        }

        let normalized = content_type.trim().to_lowercase();
        let accepted = self.accepted_content_types.iter().any(|pattern| {
            match pattern.strip_suffix("/*") {
                Some(top_level) => normalized
                    .split_once('/')
                    .is_some_and(|(top, _)| top == top_level),
                None => *pattern == normalized,
            }
        });

        if !accepted {
            return Err(ValidationError::InvalidContentType {
                name: name.to_string(),
                content_type: content_type.to_string(),
                accepted: self.accepted_content_types.clone(),
            });
        }

        Ok(())
    }

    pub fn validate(
        &self,
        name: &str,
        content_type: &str,
        size: u64,
    ) -> Result<(), ValidationError> {
        self.validate_size(name, size)?;
        self.validate_content_type(name, content_type)?;
        Ok(())
    }
}
