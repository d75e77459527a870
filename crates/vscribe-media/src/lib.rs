//! FFmpeg CLI wrapper for video segmentation and frame sampling.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Source validation with ffprobe before segmenting
//! - Progress parsing from `-progress pipe:2`
//! - Timeouts with process kill on expiry
//! - Stream-copy segmentation into fixed-length segments
//! - Fixed-rate frame sampling per segment

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod inspect;
pub mod progress;
pub mod sample;
pub mod segment;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use inspect::{expected_segment_count, inspect_source, source_duration, SourceInfo};
pub use progress::FfmpegProgress;
pub use sample::{sample_command, sample_frames, SampledFrames};
pub use segment::{segment_command, split_video};
