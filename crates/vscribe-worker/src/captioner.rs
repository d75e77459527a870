//! Frame captioning with bounded parallelism.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use vscribe_ml_client::caption::DEFAULT_MAX_EDGE;
use vscribe_ml_client::{strip_special_tokens, CaptionBackend, CaptionImage, MlError};
use vscribe_models::{Frame, FrameCaption};

use crate::config::{CaptionFailurePolicy, PipelineConfig};
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

/// Turns frame images into caption text through a [`CaptionBackend`].
///
/// One captioner is shared by every segment of a run, so its permit pool
/// bounds the caption requests in flight across the whole run.
pub struct Captioner {
    backend: Arc<dyn CaptionBackend>,
    permits: Arc<Semaphore>,
    call_timeout: Duration,
    max_edge: u32,
    policy: CaptionFailurePolicy,
    retry: RetryConfig,
}

impl Captioner {
    pub fn new(backend: Arc<dyn CaptionBackend>) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(4)),
            call_timeout: Duration::from_secs(120),
            max_edge: DEFAULT_MAX_EDGE,
            policy: CaptionFailurePolicy::default(),
            retry: RetryConfig::new("caption"),
        }
    }

    pub fn from_config(backend: Arc<dyn CaptionBackend>, config: &PipelineConfig) -> Self {
        Self::new(backend)
            .with_max_parallel(config.max_caption_parallel)
            .with_timeout(config.caption_timeout)
            .with_policy(config.caption_policy)
            .with_retries(config.caption_retries)
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max_parallel.max(1)));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: CaptionFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry = self.retry.with_max_retries(retries);
        self
    }

    pub fn with_max_edge(mut self, max_edge: u32) -> Self {
        self.max_edge = max_edge;
        self
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn policy(&self) -> CaptionFailurePolicy {
        self.policy
    }

    /// Caption a single frame image.
    pub async fn describe(&self, frame: &Path) -> PipelineResult<String> {
        // A closed semaphore cannot happen here; the permit is held either way.
        let _permit = self.permits.acquire().await;

        let path = frame.to_path_buf();
        let max_edge = self.max_edge;
        let image = tokio::task::spawn_blocking(move || CaptionImage::load(&path, max_edge))
            .await
            .map_err(|e| PipelineError::io(Stage::Caption, std::io::Error::other(e)))?
            .map_err(|e| match e {
                MlError::Image(message) => PipelineError::Input {
                    stage: Stage::Caption,
                    input: frame.to_path_buf(),
                    message,
                },
                other => PipelineError::from_ml(Stage::Caption, other),
            })?;

        let image = &image;
        let backend = self.backend.as_ref();
        let call_timeout = self.call_timeout;
        let raw = retry_async(&self.retry, PipelineError::is_retryable, || async move {
            match tokio::time::timeout(call_timeout, backend.generate(image)).await {
                Ok(result) => result.map_err(|e| PipelineError::from_ml(Stage::Caption, e)),
                Err(_) => Err(PipelineError::Timeout {
                    stage: Stage::Caption,
                    after: call_timeout,
                }),
            }
        })
        .await?;

        Ok(strip_special_tokens(&raw))
    }

    /// Caption every frame of one segment.
    ///
    /// Records come back in frame order regardless of completion order. A
    /// segment without frames yields an empty list.
    pub async fn caption_segment(&self, frames: &[Frame]) -> PipelineResult<Vec<FrameCaption>> {
        let mut ordered: Vec<&Frame> = frames.iter().collect();
        ordered.sort_by_key(|f| f.id);

        let futures = ordered.iter().map(|frame| async move {
            let started = Instant::now();
            let result = self.describe(&frame.path).await;
            metrics::record_caption(
                self.model_name(),
                started.elapsed().as_secs_f64(),
                result.is_ok(),
            );
            (*frame, result)
        });
        let results = join_all(futures).await;

        let mut captions = Vec::with_capacity(results.len());
        for (frame, result) in results {
            match result {
                Ok(text) => {
                    debug!(frame = %frame.path.display(), "Captioned: {}", text);
                    captions.push(FrameCaption::new(frame.name(), text));
                }
                Err(e) => match self.policy {
                    CaptionFailurePolicy::Abort => return Err(e),
                    CaptionFailurePolicy::Sentinel => {
                        warn!(frame = %frame.path.display(), "Captioning failed, recording sentinel: {}", e);
                        captions.push(FrameCaption::failed(frame.name(), e.to_string()));
                    }
                },
            }
        }

        Ok(captions)
    }
}
