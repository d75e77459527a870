//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder the
//! calls are no-ops.

use metrics::{counter, histogram};

use crate::error::Stage;

/// Metric names as constants for consistency.
pub mod names {
    pub const SEGMENTS_TOTAL: &str = "vscribe_segments_total";
    pub const SEGMENTS_SKIPPED_TOTAL: &str = "vscribe_segments_skipped_total";
    pub const FRAMES_CAPTIONED_TOTAL: &str = "vscribe_frames_captioned_total";
    pub const CAPTION_FAILURES_TOTAL: &str = "vscribe_caption_failures_total";
    pub const CAPTION_DURATION_SECONDS: &str = "vscribe_caption_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "vscribe_stage_duration_seconds";
    pub const ANALYSIS_CHUNKS_TOTAL: &str = "vscribe_analysis_chunks_total";
}

pub fn record_segments(count: usize) {
    counter!(names::SEGMENTS_TOTAL).increment(count as u64);
}

pub fn record_segment_skipped(stage: Stage) {
    let labels = [("stage", stage.as_str().to_string())];
    counter!(names::SEGMENTS_SKIPPED_TOTAL, &labels).increment(1);
}

pub fn record_caption(model: &str, duration_secs: f64, ok: bool) {
    let labels = [("model", model.to_string())];
    if ok {
        counter!(names::FRAMES_CAPTIONED_TOTAL, &labels).increment(1);
    } else {
        counter!(names::CAPTION_FAILURES_TOTAL, &labels).increment(1);
    }
    histogram!(names::CAPTION_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_stage(stage: Stage, duration_secs: f64) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_analysis_chunks(count: usize) {
    counter!(names::ANALYSIS_CHUNKS_TOTAL).increment(count as u64);
}
