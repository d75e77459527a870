//! HTTP client for the Ollama generate API.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{MlError, MlResult};
use crate::stream::{ndjson_chunks, ChunkStream};
use crate::types::{GenerateRequest, GenerateResponse, TagsResponse};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_ANALYSIS_MODEL: &str = "llama3.2";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Connection settings for one inference service.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the service
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Bound on a blocking request; for streams, bound on each idle read
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_ANALYSIS_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl OllamaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("OLLAMA_MODEL")
                .unwrap_or_else(|_| DEFAULT_ANALYSIS_MODEL.to_string()),
            timeout: Duration::from_secs(
                std::env::var("OLLAMA_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for an Ollama-compatible inference service.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    /// Create a new client.
    pub fn new(config: OllamaConfig) -> MlResult<Self> {
        // No total deadline here: a stream may outlive the timeout as long as chunks keep arriving.
        let http = Client::builder()
            .connect_timeout(config.timeout)
            .read_timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(OllamaConfig::from_env())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Check that the service answers and lists models.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = self.endpoint("api/tags");

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.json::<TagsResponse>().await {
                Ok(tags) => {
                    debug!("Inference service lists {} models", tags.models.len());
                    Ok(true)
                }
                Err(e) => {
                    warn!("Inference service returned an unreadable model list: {}", e);
                    Ok(false)
                }
            },
            Ok(response) => {
                warn!("Inference service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Inference service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Single blocking generate call returning the full text.
    pub async fn generate(&self, request: &GenerateRequest) -> MlResult<String> {
        let response = self.post_generate(request, Some(self.config.timeout)).await?;

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| self.decode_error(e))?;

        if let Some(error) = body.error {
            return Err(MlError::InferenceFailed(error));
        }
        body.response
            .ok_or_else(|| MlError::InvalidResponse("response field missing".to_string()))
    }

    /// Streaming generate call yielding text chunks in arrival order.
    pub async fn generate_stream(&self, request: &GenerateRequest) -> MlResult<ChunkStream> {
        let response = self.post_generate(request, None).await?;
        Ok(ndjson_chunks(
            response.bytes_stream(),
            self.config.base_url.clone(),
            self.config.timeout.as_secs(),
        ))
    }

    async fn post_generate(
        &self,
        request: &GenerateRequest,
        deadline: Option<Duration>,
    ) -> MlResult<reqwest::Response> {
        let url = self.endpoint("api/generate");
        debug!(model = %request.model, stream = request.stream, "POST {}", url);

        let mut builder = self.http.post(&url).json(request);
        if let Some(deadline) = deadline {
            builder = builder.timeout(deadline);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::Inference { status, body });
        }

        Ok(response)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn transport_error(&self, err: reqwest::Error) -> MlError {
        MlError::from_transport(err, &self.config.base_url, self.config.timeout.as_secs())
    }

    fn decode_error(&self, err: reqwest::Error) -> MlError {
        if err.is_decode() {
            MlError::InvalidResponse(err.to_string())
        } else {
            self.transport_error(err)
        }
    }
}
