//! Frame and caption models.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Output template handed to the decoder when sampling frames.
pub const FRAME_PATTERN: &str = "frame_%04d.jpg";

/// Caption text recorded for a frame whose captioning call failed.
pub const CAPTION_FAILED_SENTINEL: &str = "[captioning failed]";

const FRAME_PREFIX: &str = "frame_";
const FRAME_EXTENSION: &str = "jpg";

/// Extraction index of a frame within its segment (1-based, as numbered by
/// the image2 muxer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Parse the index out of a frame file name such as `frame_0042.jpg`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(&format!(".{FRAME_EXTENSION}"))?;
        let digits = stem.strip_prefix(FRAME_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }

    /// Parse the index from a full frame path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::from_file_name)
    }

    /// File name the decoder produces for this index.
    pub fn file_name(&self) -> String {
        format!("{FRAME_PREFIX}{:04}.{FRAME_EXTENSION}", self.0)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// A still image sampled from a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Extraction index
    pub id: FrameId,
    /// Path to the image file
    pub path: PathBuf,
}

impl Frame {
    pub fn new(id: FrameId, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }

    /// Frame identifier as written to the caption artifact (its file name).
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.file_name())
    }
}

/// One record of the caption artifact: a frame and its caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCaption {
    /// Frame file name
    pub frame: String,

    /// Caption text (may legitimately be empty)
    pub caption: String,

    /// Why captioning failed, when `caption` holds the failure sentinel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameCaption {
    /// Create a successful caption record.
    pub fn new(frame: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            frame: frame.into(),
            caption: caption.into(),
            error: None,
        }
    }

    /// Create a sentinel record for a frame that could not be captioned.
    pub fn failed(frame: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            frame: frame.into(),
            caption: CAPTION_FAILED_SENTINEL.to_string(),
            error: Some(error.into()),
        }
    }

    /// Whether this record is a failure sentinel.
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_file_name() {
        assert_eq!(FrameId::from_file_name("frame_0001.jpg"), Some(FrameId(1)));
        assert_eq!(FrameId::from_file_name("frame_0150.jpg"), Some(FrameId(150)));
        assert_eq!(FrameId::from_file_name("frame_0001.png"), None);
        assert_eq!(FrameId::from_file_name("thumb_0001.jpg"), None);
        assert_eq!(FrameId::from_file_name("frame_.jpg"), None);
    }

    #[test]
    fn test_frame_name_from_path() {
        let frame = Frame::new(FrameId(3), "/frames/segment_000/frame_0003.jpg");
        assert_eq!(frame.name(), "frame_0003.jpg");
        assert_eq!(FrameId(3).file_name(), "frame_0003.jpg");
    }

    #[test]
    fn test_caption_record_serialization() {
        let ok = FrameCaption::new("frame_0001.jpg", "a man lifting a barbell");
        let json = serde_json::to_string(&ok).unwrap();
        assert_eq!(
            json,
            r#"{"frame":"frame_0001.jpg","caption":"a man lifting a barbell"}"#
        );

        let failed = FrameCaption::failed("frame_0002.jpg", "connection refused");
        assert!(failed.is_failed());
        assert_eq!(failed.caption, CAPTION_FAILED_SENTINEL);
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains(r#""error":"connection refused""#));
    }

    #[test]
    fn test_empty_caption_is_valid() {
        let record: FrameCaption =
            serde_json::from_str(r#"{"frame":"frame_0001.jpg","caption":""}"#).unwrap();
        assert_eq!(record.caption, "");
        assert!(!record.is_failed());
    }
}
