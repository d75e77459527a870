//! Pipeline configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;
use vscribe_ml_client::{caption::DEFAULT_CAPTION_MODEL, OllamaConfig};
use vscribe_storage::DEFAULT_CAPTIONS_PATH;

use crate::error::{PipelineError, PipelineResult};

/// What to do when a single frame cannot be captioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptionFailurePolicy {
    /// Fail the whole run.
    Abort,
    /// Record the sentinel caption for the frame and continue.
    #[default]
    Sentinel,
}

impl FromStr for CaptionFailurePolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "sentinel" => Ok(Self::Sentinel),
            other => Err(PipelineError::config(format!(
                "unknown caption failure policy '{other}' (expected 'abort' or 'sentinel')"
            ))),
        }
    }
}

/// What to do when a segment cannot be sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentFailurePolicy {
    /// Fail the whole run.
    Abort,
    /// Leave the segment out of the caption map and report it.
    #[default]
    Skip,
}

impl FromStr for SegmentFailurePolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(PipelineError::config(format!(
                "unknown segment failure policy '{other}' (expected 'abort' or 'skip')"
            ))),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory segment files are written to
    pub segment_dir: PathBuf,
    /// Directory per-segment frame folders are written to
    pub frames_dir: PathBuf,
    /// Caption artifact location
    pub captions_path: PathBuf,
    /// Target segment length in seconds
    pub segment_length_secs: f64,
    /// Frames sampled per second of segment
    pub fps: f64,
    /// Bound on one decoder invocation
    pub ffmpeg_timeout: Duration,
    /// Segments sampled and captioned at the same time
    pub max_segment_parallel: usize,
    /// Caption requests in flight across the whole run
    pub max_caption_parallel: usize,
    /// Bound on a single caption call
    pub caption_timeout: Duration,
    /// Extra attempts for a caption call that failed transiently
    pub caption_retries: u32,
    pub caption_policy: CaptionFailurePolicy,
    pub segment_policy: SegmentFailurePolicy,
    /// Image-to-text service
    pub caption: OllamaConfig,
    /// Text-generation service
    pub analyzer: OllamaConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let analyzer = OllamaConfig::default();
        let caption = analyzer
            .clone()
            .with_model(DEFAULT_CAPTION_MODEL)
            .with_timeout(Duration::from_secs(120));
        Self {
            segment_dir: PathBuf::from("segments"),
            frames_dir: PathBuf::from("frames"),
            captions_path: PathBuf::from(DEFAULT_CAPTIONS_PATH),
            segment_length_secs: 10.0,
            fps: 3.0,
            ffmpeg_timeout: Duration::from_secs(600),
            max_segment_parallel: 2,
            max_caption_parallel: 4,
            caption_timeout: Duration::from_secs(120),
            caption_retries: 0,
            caption_policy: CaptionFailurePolicy::default(),
            segment_policy: SegmentFailurePolicy::default(),
            caption,
            analyzer,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_policy<T: FromStr<Err = PipelineError> + Default>(key: &str) -> T {
    match std::env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|e: PipelineError| {
            warn!("Ignoring {}: {}", key, e);
            T::default()
        }),
        Err(_) => T::default(),
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    ///
    /// Relative directories resolve against `VSCRIBE_WORK_DIR`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let work_dir = PathBuf::from(std::env::var("VSCRIBE_WORK_DIR").unwrap_or_else(|_| ".".to_string()));
        let in_work_dir = |key: &str, default: &Path| -> PathBuf {
            let path = std::env::var(key).map(PathBuf::from).unwrap_or_else(|_| default.to_path_buf());
            work_dir.join(path)
        };

        let analyzer = OllamaConfig::from_env();
        let caption_timeout = Duration::from_secs(env_or(
            "VSCRIBE_CAPTION_TIMEOUT_SECS",
            defaults.caption_timeout.as_secs(),
        ));
        let caption = OllamaConfig {
            base_url: std::env::var("CAPTION_BASE_URL").unwrap_or_else(|_| analyzer.base_url.clone()),
            model: std::env::var("CAPTION_MODEL").unwrap_or_else(|_| DEFAULT_CAPTION_MODEL.to_string()),
            timeout: caption_timeout,
        };

        Self {
            segment_dir: in_work_dir("VSCRIBE_SEGMENT_DIR", &defaults.segment_dir),
            frames_dir: in_work_dir("VSCRIBE_FRAMES_DIR", &defaults.frames_dir),
            captions_path: in_work_dir("VSCRIBE_CAPTIONS_PATH", &defaults.captions_path),
            segment_length_secs: env_or("VSCRIBE_SEGMENT_SECS", defaults.segment_length_secs),
            fps: env_or("VSCRIBE_FPS", defaults.fps),
            ffmpeg_timeout: Duration::from_secs(env_or(
                "VSCRIBE_FFMPEG_TIMEOUT_SECS",
                defaults.ffmpeg_timeout.as_secs(),
            )),
            max_segment_parallel: env_or("VSCRIBE_MAX_SEGMENT_PARALLEL", defaults.max_segment_parallel),
            max_caption_parallel: env_or("VSCRIBE_MAX_CAPTION_PARALLEL", defaults.max_caption_parallel),
            caption_timeout,
            caption_retries: env_or("VSCRIBE_CAPTION_RETRIES", defaults.caption_retries),
            caption_policy: env_policy("VSCRIBE_CAPTION_POLICY"),
            segment_policy: env_policy("VSCRIBE_SEGMENT_POLICY"),
            caption,
            analyzer,
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.segment_length_secs.is_finite() || self.segment_length_secs <= 0.0 {
            return Err(PipelineError::config(format!(
                "segment length must be positive, got {}",
                self.segment_length_secs
            )));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(PipelineError::config(format!(
                "frame sampling rate must be positive, got {}",
                self.fps
            )));
        }
        if self.max_segment_parallel == 0 || self.max_caption_parallel == 0 {
            return Err(PipelineError::config("parallelism limits must be at least 1"));
        }
        if self.caption_timeout.is_zero() || self.ffmpeg_timeout.is_zero() {
            return Err(PipelineError::config("timeouts must be non-zero"));
        }
        Ok(())
    }
}
