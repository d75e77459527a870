//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}{}", stderr.as_deref().map(|s| format!(": {s}")).unwrap_or_default())]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}{}", stderr.as_deref().map(|s| format!(": {s}")).unwrap_or_default())]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the error points at the input itself rather than the tooling.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            MediaError::FileNotFound(_)
                | MediaError::InvalidArgument(_)
                | MediaError::InvalidVideo(_)
                | MediaError::FfprobeFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_failed_message_includes_stderr() {
        let err = MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("input.mp4: Invalid data found when processing input".to_string()),
            Some(1),
        );
        let msg = err.to_string();
        assert!(msg.contains("non-zero status"));
        assert!(msg.contains("Invalid data found"));
    }

    #[test]
    fn test_input_error_classification() {
        assert!(MediaError::FileNotFound(PathBuf::from("x.mp4")).is_input_error());
        assert!(!MediaError::Timeout(10).is_input_error());
        assert!(!MediaError::ffmpeg_failed("boom", None, Some(1)).is_input_error());
        assert!(!MediaError::FfprobeNotFound.is_input_error());

        let unreadable = MediaError::FfprobeFailed {
            message: "garbage.mp4 is not a readable video".to_string(),
            stderr: Some("garbage.mp4: Invalid data found when processing input".to_string()),
        };
        assert!(unreadable.is_input_error());
        assert!(unreadable.to_string().contains("Invalid data found"));
    }
}
