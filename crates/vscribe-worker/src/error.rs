//! Pipeline error types.
//!
//! Crate-level errors (`MediaError`, `MlError`, `StorageError`) are mapped
//! into one taxonomy here so callers can tell an unusable input from a failed
//! decoder, a down inference service or a corrupt artifact, and always know
//! which stage failed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use vscribe_media::MediaError;
use vscribe_ml_client::MlError;
use vscribe_storage::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Segment,
    Sample,
    Caption,
    Store,
    Analyze,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Segment => "segmentation",
            Stage::Sample => "frame sampling",
            Stage::Caption => "captioning",
            Stage::Store => "caption store",
            Stage::Analyze => "analysis",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    ExternalProcess,
    Inference,
    ServiceUnavailable,
    Timeout,
    ArtifactFormat,
    Config,
    Io,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} failed: unusable input {}: {message}", input.display())]
    Input {
        stage: Stage,
        input: PathBuf,
        message: String,
    },

    #[error("{stage} failed for {}: {source}", input.display())]
    ExternalProcess {
        stage: Stage,
        input: PathBuf,
        #[source]
        source: MediaError,
    },

    #[error("{stage} failed: {source}")]
    Inference {
        stage: Stage,
        #[source]
        source: MlError,
    },

    #[error("{stage} failed: {message}")]
    ServiceUnavailable { stage: Stage, message: String },

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("Caption artifact {} is malformed: {source}", path.display())]
    ArtifactFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{stage} failed: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(stage: Stage, source: std::io::Error) -> Self {
        Self::Io { stage, source }
    }

    /// Map a decoder error for `input` at `stage`.
    pub fn from_media(stage: Stage, input: &Path, err: MediaError) -> Self {
        match err {
            MediaError::Timeout(secs) => Self::Timeout {
                stage,
                after: Duration::from_secs(secs),
            },
            MediaError::Io(source) => Self::Io { stage, source },
            e if e.is_input_error() => Self::Input {
                stage,
                input: input.to_path_buf(),
                message: e.to_string(),
            },
            e => Self::ExternalProcess {
                stage,
                input: input.to_path_buf(),
                source: e,
            },
        }
    }

    /// Map an inference client error at `stage`.
    pub fn from_ml(stage: Stage, err: MlError) -> Self {
        match err {
            MlError::ServiceUnavailable(_) => Self::ServiceUnavailable {
                stage,
                message: err.to_string(),
            },
            MlError::Timeout(secs) => Self::Timeout {
                stage,
                after: Duration::from_secs(secs),
            },
            e => Self::Inference { stage, source: e },
        }
    }

    /// Map a caption store error.
    pub fn from_storage(err: StorageError) -> Self {
        let stage = Stage::Store;
        match err {
            StorageError::Format { path, source } => Self::ArtifactFormat { path, source },
            StorageError::NotFound(path) => Self::Input {
                stage,
                input: path,
                message: "caption artifact does not exist".to_string(),
            },
            StorageError::Serialize(source) => Self::Io {
                stage,
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, source),
            },
            StorageError::Io(source) => Self::Io { stage, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Input { .. } => ErrorKind::Input,
            Self::ExternalProcess { .. } => ErrorKind::ExternalProcess,
            Self::Inference { .. } => ErrorKind::Inference,
            Self::ServiceUnavailable { .. } => ErrorKind::ServiceUnavailable,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ArtifactFormat { .. } => ErrorKind::ArtifactFormat,
            Self::Config(_) => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Input { stage, .. }
            | Self::ExternalProcess { stage, .. }
            | Self::Inference { stage, .. }
            | Self::ServiceUnavailable { stage, .. }
            | Self::Timeout { stage, .. }
            | Self::Io { stage, .. } => Some(*stage),
            Self::ArtifactFormat { .. } => Some(Stage::Store),
            Self::Config(_) => None,
        }
    }

    /// Whether a retry at the orchestrator level could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ServiceUnavailable { .. } | Self::Timeout { .. } => true,
            Self::Inference { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_error_mapping() {
        let input = Path::new("input.mp4");

        let err = PipelineError::from_media(Stage::Segment, input, MediaError::FileNotFound(input.into()));
        assert_eq!(err.kind(), ErrorKind::Input);
        assert!(err.to_string().starts_with("segmentation failed"));
        assert!(err.to_string().contains("input.mp4"));

        let err = PipelineError::from_media(
            Stage::Sample,
            input,
            MediaError::ffmpeg_failed("FFmpeg exited with non-zero status", None, Some(1)),
        );
        assert_eq!(err.kind(), ErrorKind::ExternalProcess);
        assert_eq!(err.stage(), Some(Stage::Sample));

        let err = PipelineError::from_media(Stage::Segment, input, MediaError::Timeout(600));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.to_string(), "segmentation timed out after 600s");
    }

    #[test]
    fn test_ml_error_mapping() {
        let err = PipelineError::from_ml(
            Stage::Analyze,
            MlError::ServiceUnavailable("http://localhost:11434".into()),
        );
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert!(err.to_string().contains("ollama serve"));

        let err = PipelineError::from_ml(
            Stage::Caption,
            MlError::Inference { status: 500, body: "oom".into() },
        );
        assert_eq!(err.kind(), ErrorKind::Inference);
        assert!(err.is_retryable());

        let err = PipelineError::from_ml(Stage::Analyze, MlError::Timeout(300));
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_subsecond_timeout_keeps_precision() {
        let err = PipelineError::Timeout {
            stage: Stage::Caption,
            after: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "captioning timed out after 250ms");
    }

    #[test]
    fn test_storage_error_mapping() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = PipelineError::from_storage(StorageError::format("captions.json", source));
        assert_eq!(err.kind(), ErrorKind::ArtifactFormat);
        assert_eq!(err.stage(), Some(Stage::Store));

        let err = PipelineError::from_storage(StorageError::NotFound("captions.json".into()));
        assert_eq!(err.kind(), ErrorKind::Input);
    }
}
