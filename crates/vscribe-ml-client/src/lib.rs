//! Clients for the inference services used by the pipeline.
//!
//! Both services speak the Ollama generate API:
//! - the captioning service receives one base64 JPEG per request and
//!   returns a short description
//! - the analysis service receives an assembled prompt and returns the
//!   assessment, either whole or as a newline-delimited JSON stream

pub mod analyzer;
pub mod caption;
pub mod client;
pub mod error;
pub mod stream;
pub mod types;

pub use analyzer::{collect_stream, collect_stream_with, Analyzer};
pub use caption::{strip_special_tokens, CaptionBackend, CaptionImage, OllamaCaptionBackend};
pub use client::{OllamaClient, OllamaConfig};
pub use error::{MlError, MlResult};
pub use stream::{ChunkStream, NdjsonDecoder};
pub use types::{GenerateOptions, GenerateRequest, GenerateResponse};
