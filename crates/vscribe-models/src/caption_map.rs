//! Ordered segment -> captions mapping.
//!
//! The caption map is the artifact that bridges the captioning phase and the
//! analysis phase. Segment keys keep the order segments were produced in and
//! records keep sampling order, both in memory and on the wire: it serializes
//! as a JSON object whose keys appear in insertion order.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::frame::FrameCaption;

/// Captions for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    /// Segment file name
    pub segment: String,
    /// Caption records in sampling order
    pub captions: Vec<FrameCaption>,
}

/// Insertion-ordered mapping from segment file name to its caption records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptionMap {
    entries: Vec<SegmentEntry>,
}

impl CaptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment. Returns `false` and leaves the map untouched if the
    /// key is already present.
    pub fn insert(&mut self, segment: impl Into<String>, captions: Vec<FrameCaption>) -> bool {
        let segment = segment.into();
        if self.contains(&segment) {
            return false;
        }
        self.entries.push(SegmentEntry { segment, captions });
        true
    }

    pub fn contains(&self, segment: &str) -> bool {
        self.entries.iter().any(|e| e.segment == segment)
    }

    /// Captions recorded for a segment.
    pub fn get(&self, segment: &str) -> Option<&[FrameCaption]> {
        self.entries
            .iter()
            .find(|e| e.segment == segment)
            .map(|e| e.captions.as_slice())
    }

    /// Iterate segments in production order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FrameCaption])> {
        self.entries
            .iter()
            .map(|e| (e.segment.as_str(), e.captions.as_slice()))
    }

    pub fn entries(&self) -> &[SegmentEntry] {
        &self.entries
    }

    /// Segment keys in production order.
    pub fn segments(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.segment.as_str()).collect()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of caption records across all segments.
    pub fn frame_count(&self) -> usize {
        self.entries.iter().map(|e| e.captions.len()).sum()
    }

    /// Number of failure sentinel records.
    pub fn failed_count(&self) -> usize {
        self.entries
            .iter()
            .flat_map(|e| e.captions.iter())
            .filter(|c| c.is_failed())
            .count()
    }
}

impl Serialize for CaptionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.segment, &entry.captions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CaptionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CaptionMapVisitor)
    }
}

struct CaptionMapVisitor;

impl<'de> Visitor<'de> for CaptionMapVisitor {
    type Value = CaptionMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping from segment name to a list of {frame, caption} records")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = CaptionMap::new();
        while let Some((segment, captions)) = access.next_entry::<String, Vec<FrameCaption>>()? {
            if map.contains(&segment) {
                return Err(de::Error::custom(format!("duplicate segment key `{segment}`")));
            }
            map.insert(segment, captions);
        }
        Ok(map)
    }
}
