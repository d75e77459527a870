//! Segment models.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Output template handed to the decoder when splitting a video.
pub const SEGMENT_PATTERN: &str = "segment_%03d.mp4";

const SEGMENT_PREFIX: &str = "segment_";
const SEGMENT_EXTENSION: &str = "mp4";

/// Sequence index of a segment (0-based, as numbered by the segment muxer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u32);

impl SegmentId {
    /// Parse the index out of a segment file name such as `segment_007.mp4`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(&format!(".{SEGMENT_EXTENSION}"))?;
        let digits = stem.strip_prefix(SEGMENT_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }

    /// Parse the index from a full segment path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::from_file_name)
    }

    /// File name the decoder produces for this index.
    pub fn file_name(&self) -> String {
        format!("{SEGMENT_PREFIX}{:03}.{SEGMENT_EXTENSION}", self.0)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// A fixed-duration slice of the source video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Sequence index
    pub id: SegmentId,
    /// Path to the segment file
    pub path: PathBuf,
}

impl Segment {
    pub fn new(id: SegmentId, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }

    /// Key used for this segment in the caption map (its file name).
    pub fn key(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.id.file_name())
    }

    /// File stem, used to name the segment's frame directory.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{SEGMENT_PREFIX}{}", self.id))
    }
}
