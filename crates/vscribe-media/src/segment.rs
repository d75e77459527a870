//! Stream-copy segmentation of a source video.
//!
//! The whole source is split by a single decoder invocation into
//! fixed-duration, non-overlapping segments. Timestamps are reset per
//! segment so each one plays independently from time zero. Cuts land on
//! keyframes, so segment durations are only as exact as the source's GOP.

use std::path::Path;
use tracing::{debug, info};

use vscribe_models::{Segment, SegmentId, SEGMENT_PATTERN};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{list_indexed, remove_indexed};

/// Build the decoder command that splits `source` into `segment_length_secs` chunks.
pub fn segment_command(source: &Path, output_dir: &Path, segment_length_secs: f64) -> FfmpegCommand {
    FfmpegCommand::new(source, output_dir.join(SEGMENT_PATTERN))
        .codec_copy()
        .map_all()
        .format("segment")
        .output_args([
            "-segment_time".to_string(),
            format_seconds(segment_length_secs),
            "-reset_timestamps".to_string(),
            "1".to_string(),
        ])
}

/// Split a video into fixed-length segments.
///
/// Creates `output_dir` if needed and returns the segments in sequence
/// order. A source shorter than one segment yields a single segment.
pub async fn split_video(
    source: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    segment_length_secs: f64,
    runner: &FfmpegRunner,
) -> MediaResult<Vec<Segment>> {
    let source = source.as_ref();
    let output_dir = output_dir.as_ref();

    if !segment_length_secs.is_finite() || segment_length_secs <= 0.0 {
        return Err(MediaError::invalid_argument(format!(
            "segment length must be positive, got {segment_length_secs}"
        )));
    }
    if !source.is_file() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }

    tokio::fs::create_dir_all(output_dir).await?;
    remove_indexed(output_dir, SegmentId::from_path).await?;

    info!(
        "Splitting {} into {}s segments -> {}",
        source.display(),
        segment_length_secs,
        output_dir.display()
    );

    let cmd = segment_command(source, output_dir, segment_length_secs);
    runner
        .run_with_progress(&cmd, |p| {
            if p.is_complete {
                debug!(frames = p.frame, "Segmentation finished");
            }
        })
        .await?;

    let segments: Vec<Segment> = list_indexed(output_dir, SegmentId::from_path)
        .await?
        .into_iter()
        .map(|(id, path)| Segment::new(id, path))
        .collect();

    if segments.is_empty() {
        return Err(MediaError::InvalidVideo(format!(
            "decoder produced no segments for {}",
            source.display()
        )));
    }

    info!("Created {} segments from {}", segments.len(), source.display());
    Ok(segments)
}

/// Format seconds for decoder arguments without a trailing `.0`.
pub(crate) fn format_seconds(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{secs}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_command_args() {
        let cmd = segment_command(Path::new("input.mp4"), Path::new("segments"), 10.0);
        let args = cmd.build_args();

        let tail: Vec<&str> = args.iter().skip_while(|a| *a != "-i").map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "-i",
                "input.mp4",
                "-c",
                "copy",
                "-map",
                "0",
                "-f",
                "segment",
                "-segment_time",
                "10",
                "-reset_timestamps",
                "1",
                "segments/segment_%03d.mp4",
            ]
        );
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(10.0), "10");
        assert_eq!(format_seconds(2.5), "2.5");
    }

    #[tokio::test]
    async fn test_rejects_non_positive_length() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("input.mp4");
        tokio::fs::write(&source, b"not really a video").await.unwrap();

        for bad in [0.0, -5.0, f64::NAN] {
            let err = split_video(&source, dir.path().join("segments"), bad, &FfmpegRunner::new())
                .await
                .unwrap_err();
            assert!(matches!(err, MediaError::InvalidArgument(_)));
        }
    }

    #[tokio::test]
    async fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = split_video(
            dir.path().join("missing.mp4"),
            dir.path().join("segments"),
            10.0,
            &FfmpegRunner::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(err.is_input_error());
    }
}
