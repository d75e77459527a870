//! Text-analysis client.

use futures::StreamExt;
use tracing::info;

use vscribe_models::AnalysisResult;

use crate::client::{OllamaClient, OllamaConfig};
use crate::error::MlResult;
use crate::stream::ChunkStream;
use crate::types::GenerateRequest;

/// Submits assembled prompts to the text-analysis model.
#[derive(Debug, Clone)]
pub struct Analyzer {
    client: OllamaClient,
}

impl Analyzer {
    pub fn new(config: OllamaConfig) -> MlResult<Self> {
        info!("Using analysis model: {}", config.model);
        Ok(Self {
            client: OllamaClient::new(config)?,
        })
    }

    /// Create from `OLLAMA_*` environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(OllamaConfig::from_env())
    }

    pub fn model(&self) -> &str {
        &self.client.config().model
    }

    pub async fn health_check(&self) -> MlResult<bool> {
        self.client.health_check().await
    }

    /// Blocking analysis: one request, full text back.
    pub async fn analyze(&self, prompt: &str) -> MlResult<String> {
        let request = GenerateRequest::new(self.model(), prompt, false);
        self.client.generate(&request).await
    }

    /// Streaming analysis: chunks arrive as the model generates them.
    pub async fn analyze_streaming(&self, prompt: &str) -> MlResult<ChunkStream> {
        let request = GenerateRequest::new(self.model(), prompt, true);
        self.client.generate_stream(&request).await
    }
}

/// Accumulate a chunk stream in arrival order.
pub async fn collect_stream(stream: ChunkStream) -> MlResult<AnalysisResult> {
    collect_stream_with(stream, |_| {}).await
}

/// Accumulate a chunk stream, handing each chunk to `on_chunk` as it arrives.
pub async fn collect_stream_with<F>(mut stream: ChunkStream, mut on_chunk: F) -> MlResult<AnalysisResult>
where
    F: FnMut(&str),
{
    let mut result = AnalysisResult::default();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        on_chunk(&chunk);
        result.push_chunk(&chunk);
    }
    Ok(result)
}
