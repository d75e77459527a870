//! Source validation through ffprobe.

use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// What ffprobe reports about a source's first video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    /// Container duration in seconds, when the container records one
    pub duration: Option<f64>,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

impl SourceInfo {
    /// Segments a split at `segment_length` should yield, if the duration is known.
    pub fn expected_segments(&self, segment_length: f64) -> Option<usize> {
        self.duration.map(|d| expected_segment_count(d, segment_length))
    }
}

#[derive(Debug, Deserialize)]
struct Entries {
    #[serde(default)]
    format: Option<FormatEntry>,
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct FormatEntry {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Confirm `path` is a readable video before any segmenting work starts.
///
/// Undecodable or stream-less sources come back as input errors; a missing
/// ffprobe binary is reported as [`MediaError::FfprobeNotFound`].
pub async fn inspect_source(path: impl AsRef<Path>) -> MediaResult<SourceInfo> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration:stream=codec_type,codec_name,width,height",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(MediaError::FfprobeFailed {
            message: format!("{} is not a readable video", path.display()),
            stderr: (!stderr.is_empty()).then_some(stderr),
        });
    }

    parse_entries(&output.stdout, path)
}

/// Duration of `path` in seconds, or 0 when the container has none.
pub async fn source_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    Ok(inspect_source(path).await?.duration.unwrap_or(0.0))
}

/// Number of segments a video of `duration` seconds splits into: `ceil(D / L)`,
/// and at least one for any non-empty source.
pub fn expected_segment_count(duration: f64, segment_length: f64) -> usize {
    if duration <= 0.0 || segment_length <= 0.0 {
        return 0;
    }
    ((duration / segment_length).ceil() as usize).max(1)
}

fn parse_entries(stdout: &[u8], path: &Path) -> MediaResult<SourceInfo> {
    let entries: Entries = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::InvalidVideo(format!("unreadable ffprobe report for {}: {e}", path.display())))?;

    let video = entries
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MediaError::InvalidVideo(format!("no video stream in {}", path.display())))?;

    let duration = entries
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(SourceInfo {
        duration,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        codec: video.codec_name.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_segment_count() {
        assert_eq!(expected_segment_count(25.0, 10.0), 3);
        assert_eq!(expected_segment_count(20.0, 10.0), 2);
        assert_eq!(expected_segment_count(4.2, 10.0), 1);
        assert_eq!(expected_segment_count(0.0, 10.0), 0);
    }

    #[test]
    fn test_parse_entries_picks_video_stream() {
        let report = br#"{
            "streams": [
                {"codec_type": "audio", "codec_name": "aac"},
                {"codec_type": "video", "codec_name": "h264", "width": 1280, "height": 720}
            ],
            "format": {"duration": "25.040000"}
        }"#;
        let info = parse_entries(report, Path::new("clip.mp4")).unwrap();
        assert_eq!(info.codec, "h264");
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.expected_segments(10.0), Some(3));
    }

    #[test]
    fn test_audio_only_source_is_invalid() {
        let report = br#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        let err = parse_entries(report, Path::new("song.m4a")).unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
        assert!(err.is_input_error());
    }

    #[test]
    fn test_missing_duration_is_unknown() {
        let report = br#"{"streams": [{"codec_type": "video"}], "format": {"duration": "N/A"}}"#;
        let info = parse_entries(report, Path::new("live.ts")).unwrap();
        assert_eq!(info.duration, None);
        assert_eq!(info.expected_segments(10.0), None);
    }

    #[tokio::test]
    async fn test_inspect_missing_file() {
        let err = inspect_source("/definitely/not/here.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
