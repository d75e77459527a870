//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while saving or loading the caption artifact.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Caption artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("Malformed caption artifact {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize caption map: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn format(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Format {
            path: path.into(),
            source,
        }
    }

    /// Whether the artifact exists but could not be parsed.
    pub fn is_format_error(&self) -> bool {
        matches!(self, StorageError::Format { .. })
    }
}
