//! Shared data models for the VScribe captioning pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Segments and sampled frames
//! - Frame captions and the ordered caption map artifact
//! - Analysis results

pub mod analysis;
pub mod caption_map;
pub mod frame;
pub mod segment;

pub use analysis::AnalysisResult;
pub use caption_map::{CaptionMap, SegmentEntry};
pub use frame::{Frame, FrameCaption, FrameId, CAPTION_FAILED_SENTINEL, FRAME_PATTERN};
pub use segment::{Segment, SegmentId, SEGMENT_PATTERN};
