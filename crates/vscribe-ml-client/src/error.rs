//! ML client error types.

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    /// The endpoint could not be reached at all.
    #[error("Cannot connect to inference service at {0}. Make sure Ollama is running (ollama serve)")]
    ServiceUnavailable(String),

    /// The service answered with a non-success status.
    #[error("Inference service returned {status}: {body}")]
    Inference { status: u16, body: String },

    /// The service reported a failure inside an otherwise successful response.
    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid image: {0}")]
    Image(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MlError {
    /// Classify a transport error from reqwest.
    pub fn from_transport(err: reqwest::Error, base_url: &str, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            MlError::Timeout(timeout_secs)
        } else if err.is_connect() {
            MlError::ServiceUnavailable(base_url.to_string())
        } else {
            MlError::Network(err)
        }
    }

    /// Whether a caller-side retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MlError::ServiceUnavailable(_) | MlError::Timeout(_) | MlError::Network(_) => true,
            MlError::Inference { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
