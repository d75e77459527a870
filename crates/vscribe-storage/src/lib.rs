//! Caption map persistence.
//!
//! This crate provides:
//! - Atomic save of the caption map as pretty-printed JSON
//! - Strict load that rejects malformed or truncated artifacts

pub mod caption_store;
pub mod error;

pub use caption_store::{load, save, CaptionStore, DEFAULT_CAPTIONS_PATH};
pub use error::{StorageError, StorageResult};
