//! Prompt assembly from caption records.
//!
//! Assembly is a pure function of the caption map and the template: the same
//! inputs always produce byte-identical prompts.

use vscribe_models::{CaptionMap, FrameCaption};

use crate::error::{PipelineError, PipelineResult};

/// Placeholder replaced by the assembled caption text.
pub const CAPTIONS_PLACEHOLDER: &str = "{captions}";

const ACTIVITY_ASSESSMENT: &str = "You are an expert physiotherapist reviewing frames from an exercise video.
The frames are described below, one per line, in the order they were filmed:

{captions}

From these descriptions, give:
1. An overall assessment of the exercise technique
2. Common mistakes or issues you observe
3. Recommendations for improvement
4. Any safety concerns
5. How the quality of movement develops over the video

Write a detailed, professional analysis.";

const SEGMENT_KEYNOTES: &str = "You are an assistant that extracts keynotes from frame by frame descriptions of a video.
The video is split into short segments and several frames per second of each segment are described.
Identify and summarize the main points of the content: significant events, actions and information conveyed by the frames.
Keep the summary concise while keeping the important details.
Each description is a JSON record of the form {\"frame\": \"frame_0001.jpg\", \"caption\": \"caption text\"}.
Here are the descriptions:
{captions}";

/// Instruction text with a slot for caption content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Wrap a custom template. It must contain [`CAPTIONS_PLACEHOLDER`].
    pub fn new(text: impl Into<String>) -> PipelineResult<Self> {
        let text = text.into();
        if !text.contains(CAPTIONS_PLACEHOLDER) {
            return Err(PipelineError::config(format!(
                "prompt template has no {CAPTIONS_PLACEHOLDER} placeholder"
            )));
        }
        Ok(Self { text })
    }

    /// Expert assessment of the activity shown across the whole video.
    pub fn activity_assessment() -> Self {
        Self {
            text: ACTIVITY_ASSESSMENT.to_string(),
        }
    }

    /// Keynote extraction from JSON frame records.
    pub fn segment_keynotes() -> Self {
        Self {
            text: SEGMENT_KEYNOTES.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substitute `captions` into the template.
    ///
    /// The inserted text is not scanned again, so captions containing the
    /// placeholder are kept verbatim.
    pub fn render(&self, captions: &str) -> String {
        let mut parts = self.text.split(CAPTIONS_PLACEHOLDER);
        let mut out = String::with_capacity(self.text.len() + captions.len());
        if let Some(first) = parts.next() {
            out.push_str(first);
        }
        for part in parts {
            out.push_str(captions);
            out.push_str(part);
        }
        out
    }
}

/// `"<frame>: <caption>"` lines joined by newlines.
pub fn caption_lines<'a>(records: impl IntoIterator<Item = &'a FrameCaption>) -> String {
    records
        .into_iter()
        .map(|r| format!("{}: {}", r.frame, r.caption))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt covering every frame of every segment, in artifact order.
pub fn build_video_prompt(map: &CaptionMap, template: &PromptTemplate) -> String {
    let lines = caption_lines(map.iter().flat_map(|(_, captions)| captions.iter()));
    template.render(&lines)
}

/// Prompt covering the frames of one segment.
pub fn build_segment_prompt(captions: &[FrameCaption], template: &PromptTemplate) -> String {
    template.render(&caption_lines(captions))
}

/// Prompt embedding one record as compact JSON.
pub fn build_entry_prompt(record: &FrameCaption, template: &PromptTemplate) -> String {
    // Serializing plain strings cannot fail; fall back to the line format anyway.
    let embedded = serde_json::to_string(record)
        .unwrap_or_else(|_| format!("{}: {}", record.frame, record.caption));
    template.render(&embedded)
}

/// One keynote prompt per segment, built from the segment's first record.
///
/// Segments without frames are left out.
pub fn segment_entry_prompts(map: &CaptionMap, template: &PromptTemplate) -> Vec<(String, String)> {
    map.iter()
        .filter_map(|(segment, captions)| {
            captions
                .first()
                .map(|first| (segment.to_string(), build_entry_prompt(first, template)))
        })
        .collect()
}
