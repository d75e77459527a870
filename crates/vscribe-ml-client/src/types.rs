//! Generate API request/response types.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Model identifier
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Whether to stream newline-delimited partial responses
    pub stream: bool,
    /// Base64-encoded images for vision models
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Sampling options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, stream: bool) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream,
            images: Vec::new(),
            options: None,
        }
    }

    pub fn with_image(mut self, base64_image: String) -> Self {
        self.images.push(base64_image);
        self
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = Some(options);
        self
    }
}

/// Sampling options. Zero temperature with a fixed seed gives repeatable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl GenerateOptions {
    pub fn deterministic() -> Self {
        Self {
            temperature: Some(0.0),
            seed: Some(0),
        }
    }
}

/// A whole response, or one record of a streamed response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: Option<String>,
    /// Generated text (incremental chunk when streaming)
    #[serde(default)]
    pub response: Option<String>,
    /// Completion signal
    #[serde(default)]
    pub done: bool,
    /// Service-side failure
    #[serde(default)]
    pub error: Option<String>,
}

/// Response of `GET /api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTag {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_request_body() {
        let req = GenerateRequest::new("llama3.2", "hello", false);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "llama3.2", "prompt": "hello", "stream": false})
        );
    }

    #[test]
    fn test_vision_request_body() {
        let req = GenerateRequest::new("llava", "describe", false)
            .with_image("aGk=".to_string())
            .with_options(GenerateOptions::deterministic());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["images"][0], "aGk=");
        assert_eq!(json["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_stream_record_defaults() {
        let rec: GenerateResponse = serde_json::from_str(r#"{"done": true}"#).unwrap();
        assert!(rec.done);
        assert!(rec.response.is_none());
    }
}
