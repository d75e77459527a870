//! Fixed-rate frame sampling of a segment.

use std::path::{Path, PathBuf};
use tracing::debug;

use vscribe_models::{Frame, FrameId, FRAME_PATTERN};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{list_indexed, remove_indexed};
use crate::segment::format_seconds;

/// Frames extracted from one segment.
#[derive(Debug, Clone)]
pub struct SampledFrames {
    /// Per-segment directory holding the frames
    pub dir: PathBuf,
    /// Frames in extraction order
    pub frames: Vec<Frame>,
}

/// Build the decoder command that samples `segment` at `fps` into `frame_dir`.
pub fn sample_command(segment: &Path, frame_dir: &Path, fps: f64) -> FfmpegCommand {
    FfmpegCommand::new(segment, frame_dir.join(FRAME_PATTERN))
        .video_filter(format!("fps={}", format_seconds(fps)))
}

/// Extract frames from a segment at a fixed rate.
///
/// Frames land in `output_dir/<segment stem>/` so names never collide
/// across segments. Ordering follows the decoder's output numbering.
pub async fn sample_frames(
    segment: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    fps: f64,
    runner: &FfmpegRunner,
) -> MediaResult<SampledFrames> {
    let segment = segment.as_ref();
    let output_dir = output_dir.as_ref();

    if !fps.is_finite() || fps <= 0.0 {
        return Err(MediaError::invalid_argument(format!(
            "frame rate must be positive, got {fps}"
        )));
    }
    if !segment.is_file() {
        return Err(MediaError::FileNotFound(segment.to_path_buf()));
    }

    let stem = segment
        .file_stem()
        .ok_or_else(|| MediaError::invalid_argument(format!("segment path has no file name: {}", segment.display())))?;
    let frame_dir = output_dir.join(stem);

    tokio::fs::create_dir_all(&frame_dir).await?;
    remove_indexed(&frame_dir, FrameId::from_path).await?;

    let cmd = sample_command(segment, &frame_dir, fps);
    runner.run(&cmd).await?;

    let frames: Vec<Frame> = list_indexed(&frame_dir, FrameId::from_path)
        .await?
        .into_iter()
        .map(|(id, path)| Frame::new(id, path))
        .collect();

    debug!(
        segment = %segment.display(),
        frames = frames.len(),
        "Sampled frames at {} fps",
        fps
    );

    Ok(SampledFrames {
        dir: frame_dir,
        frames,
    })
}
