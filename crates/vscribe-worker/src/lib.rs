//! Video captioning and analysis pipeline.
//!
//! A run splits a video into fixed-length segments, samples frames from each
//! segment, captions every frame through an image-to-text service and stores
//! the ordered captions as a JSON artifact. The artifact is then assembled
//! into a prompt for a text-generation service.

pub mod analysis;
pub mod captioner;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod prompt;
pub mod retry;

pub use analysis::{analyze_captions, summarize_segments};
pub use captioner::Captioner;
pub use config::{CaptionFailurePolicy, PipelineConfig, SegmentFailurePolicy};
pub use error::{ErrorKind, PipelineError, PipelineResult, Stage};
pub use logging::{init_tracing, RunLogger};
pub use pipeline::{assemble_caption_map, Pipeline, PipelineReport, SkippedSegment};
pub use prompt::{
    build_entry_prompt, build_segment_prompt, build_video_prompt, segment_entry_prompts, PromptTemplate,
    CAPTIONS_PLACEHOLDER,
};
pub use retry::{retry_async, RetryConfig};
