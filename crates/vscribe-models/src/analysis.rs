//! Analysis result model.

use serde::{Deserialize, Serialize};

/// Text returned by the analysis service, whole or accumulated from chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Full generated text
    pub text: String,
    /// Number of chunks the text was accumulated from (1 for blocking calls)
    pub chunks: usize,
}

impl AnalysisResult {
    /// Result of a single blocking call.
    pub fn whole(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            chunks: 1,
        }
    }

    /// Append a streamed chunk in arrival order.
    pub fn push_chunk(&mut self, chunk: &str) {
        self.text.push_str(chunk);
        self.chunks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_accumulation_preserves_order() {
        let mut result = AnalysisResult::default();
        for chunk in ["The ", "squat ", "", "depth is good."] {
            result.push_chunk(chunk);
        }
        assert_eq!(result.text, "The squat depth is good.");
        assert_eq!(result.chunks, 4);
    }
}
