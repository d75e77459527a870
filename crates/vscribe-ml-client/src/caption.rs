//! Image captioning backend.

use std::path::Path;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ColorType;
use tracing::debug;

use crate::client::{OllamaClient, OllamaConfig};
use crate::error::{MlError, MlResult};
use crate::types::{GenerateOptions, GenerateRequest};

/// Longest edge, in pixels, of the image sent to the captioning model.
pub const DEFAULT_MAX_EDGE: u32 = 384;

pub const DEFAULT_CAPTION_MODEL: &str = "llava";

pub const DEFAULT_CAPTION_PROMPT: &str =
    "Describe this image in one short sentence. Mention the people, their posture and what they are doing.";

const JPEG_QUALITY: u8 = 90;

/// Control tokens some models leak into decoded output.
const SPECIAL_TOKENS: &[&str] = &[
    "<|endoftext|>",
    "<|im_start|>",
    "<|im_end|>",
    "<|eot_id|>",
    "<|begin_of_text|>",
    "<|end_of_text|>",
    "<s>",
    "</s>",
    "<pad>",
    "<unk>",
    "[CLS]",
    "[SEP]",
    "[PAD]",
    "[UNK]",
];

/// A frame normalized for captioning: RGB8, bounded size, JPEG-encoded.
#[derive(Debug, Clone)]
pub struct CaptionImage {
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

impl CaptionImage {
    /// Load an image file and convert it to the canonical form.
    ///
    /// Decoding is CPU-bound; call from a blocking thread.
    pub fn load(path: &Path, max_edge: u32) -> MlResult<Self> {
        let img = image::open(path)
            .map_err(|e| MlError::Image(format!("{}: {e}", path.display())))?;
        let mut rgb = img.to_rgb8();

        let (w, h) = rgb.dimensions();
        let longest = w.max(h);
        if max_edge > 0 && longest > max_edge {
            let scale = max_edge as f64 / longest as f64;
            let nw = ((w as f64 * scale).round() as u32).max(1);
            let nh = ((h as f64 * scale).round() as u32).max(1);
            rgb = image::imageops::resize(&rgb, nw, nh, FilterType::Triangle);
        }

        let (width, height) = rgb.dimensions();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
            .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
            .map_err(|e| MlError::Image(format!("{}: {e}", path.display())))?;

        Ok(Self { width, height, jpeg })
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.jpeg)
    }
}

/// An image-to-text inference service.
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    /// Generate raw caption text for one image.
    async fn generate(&self, image: &CaptionImage) -> MlResult<String>;

    /// Identifier of the model behind this backend, for logs.
    fn model_name(&self) -> &str;
}

/// Captioning through a vision model served by the Ollama generate API.
#[derive(Debug, Clone)]
pub struct OllamaCaptionBackend {
    client: OllamaClient,
    prompt: String,
}

impl OllamaCaptionBackend {
    pub fn new(config: OllamaConfig) -> MlResult<Self> {
        Ok(Self {
            client: OllamaClient::new(config)?,
            prompt: DEFAULT_CAPTION_PROMPT.to_string(),
        })
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

#[async_trait]
impl CaptionBackend for OllamaCaptionBackend {
    async fn generate(&self, image: &CaptionImage) -> MlResult<String> {
        let request = GenerateRequest::new(&self.client.config().model, &self.prompt, false)
            .with_image(image.to_base64())
            .with_options(GenerateOptions::deterministic());

        debug!(
            width = image.width,
            height = image.height,
            bytes = image.jpeg.len(),
            "Requesting caption"
        );
        self.client.generate(&request).await
    }

    fn model_name(&self) -> &str {
        &self.client.config().model
    }
}

/// Remove control tokens and collapse whitespace. An empty result is a valid caption.
pub fn strip_special_tokens(text: &str) -> String {
    let mut cleaned = text.to_string();
    for token in SPECIAL_TOKENS {
        if cleaned.contains(token) {
            cleaned = cleaned.replace(token, " ");
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
