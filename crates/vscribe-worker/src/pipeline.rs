//! End-to-end captioning run: segment, sample, caption, store.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, Instrument};
use vscribe_media::{inspect_source, sample_frames, split_video, FfmpegRunner, MediaError};
use vscribe_models::{CaptionMap, FrameCaption, Segment};
use vscribe_storage::CaptionStore;

use crate::captioner::Captioner;
use crate::config::{PipelineConfig, SegmentFailurePolicy};
use crate::error::{PipelineError, PipelineResult, Stage};
use crate::logging::RunLogger;
use crate::metrics;

/// A segment left out of the caption map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSegment {
    pub segment: String,
    pub stage: Stage,
    pub reason: String,
}

/// Outcome of a completed run.
#[derive(Debug)]
pub struct PipelineReport {
    pub run_id: String,
    pub caption_map: CaptionMap,
    /// Where the caption artifact was written
    pub artifact_path: PathBuf,
    pub skipped: Vec<SkippedSegment>,
    /// Frames recorded with the failure sentinel
    pub failed_frames: usize,
}

/// Orchestrates one video through every captioning stage.
pub struct Pipeline {
    config: PipelineConfig,
    captioner: Captioner,
    runner: FfmpegRunner,
    store: CaptionStore,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, captioner: Captioner) -> PipelineResult<Self> {
        config.validate()?;
        let runner = FfmpegRunner::new().with_timeout(config.ffmpeg_timeout);
        let store = CaptionStore::new(&config.captions_path);
        Ok(Self {
            config,
            captioner,
            runner,
            store,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Caption `video` and persist the caption map.
    ///
    /// The artifact is only written once every segment has been handled.
    pub async fn run(&self, video: &Path) -> PipelineResult<PipelineReport> {
        let logger = RunLogger::new("caption_video");
        let span = logger.create_span();
        self.run_with_logger(video, &logger).instrument(span).await
    }

    async fn run_with_logger(&self, video: &Path, logger: &RunLogger) -> PipelineResult<PipelineReport> {
        logger.log_start(&format!(
            "{} (segments of {}s, {} fps, caption model {})",
            video.display(),
            self.config.segment_length_secs,
            self.config.fps,
            self.captioner.model_name()
        ));

        let result = self.caption_video(video, logger).await;
        let (caption_map, skipped) = match result {
            Ok(v) => v,
            Err(e) => {
                logger.log_error(&e.to_string());
                return Err(e);
            }
        };

        let started = Instant::now();
        if let Err(e) = self.store.save(&caption_map).await {
            let e = PipelineError::from_storage(e);
            logger.log_error(&e.to_string());
            return Err(e);
        }
        metrics::record_stage(Stage::Store, started.elapsed().as_secs_f64());

        let failed_frames = caption_map.failed_count();
        logger.log_completion(&format!(
            "{} segments, {} frames ({} failed), {} skipped -> {}",
            caption_map.len(),
            caption_map.frame_count(),
            failed_frames,
            skipped.len(),
            self.store.path().display()
        ));

        Ok(PipelineReport {
            run_id: logger.run_id().to_string(),
            caption_map,
            artifact_path: self.store.path().to_path_buf(),
            skipped,
            failed_frames,
        })
    }

    /// Build the caption map for `video` without persisting it.
    pub async fn caption_video(
        &self,
        video: &Path,
        logger: &RunLogger,
    ) -> PipelineResult<(CaptionMap, Vec<SkippedSegment>)> {
        let started = Instant::now();
        match inspect_source(video).await {
            Ok(info) => debug!(
                codec = %info.codec,
                width = info.width,
                height = info.height,
                expected_segments = ?info.expected_segments(self.config.segment_length_secs),
                "Source {} is readable",
                video.display()
            ),
            // Without ffprobe the split itself is the first check on the source.
            Err(MediaError::FfprobeNotFound) => {
                debug!("ffprobe not on PATH; skipping source check for {}", video.display())
            }
            Err(e) => return Err(PipelineError::from_media(Stage::Segment, video, e)),
        }

        let segments = split_video(
            video,
            &self.config.segment_dir,
            self.config.segment_length_secs,
            &self.runner,
        )
        .await
        .map_err(|e| PipelineError::from_media(Stage::Segment, video, e))?;
        metrics::record_stage(Stage::Segment, started.elapsed().as_secs_f64());
        metrics::record_segments(segments.len());
        logger.log_progress(&format!("split into {} segments", segments.len()));

        // One result slot per segment, in segment order.
        let outcomes = bounded_join(&segments, self.config.max_segment_parallel, |segment| async move {
            let outcome = self.process_segment(segment).await;
            if outcome.is_ok() {
                logger.log_progress(&format!("captioned {}", segment.key()));
            }
            outcome
        })
        .await;

        assemble_caption_map(&segments, outcomes, self.config.segment_policy, logger)
    }

    async fn process_segment(&self, segment: &Segment) -> PipelineResult<Vec<FrameCaption>> {
        let started = Instant::now();
        let sampled = sample_frames(&segment.path, &self.config.frames_dir, self.config.fps, &self.runner)
            .await
            .map_err(|e| PipelineError::from_media(Stage::Sample, &segment.path, e))?;
        metrics::record_stage(Stage::Sample, started.elapsed().as_secs_f64());

        if sampled.frames.is_empty() {
            info!(segment = %segment.key(), "Segment produced no frames");
        }

        let started = Instant::now();
        let captions = self.captioner.caption_segment(&sampled.frames).await?;
        metrics::record_stage(Stage::Caption, started.elapsed().as_secs_f64());
        Ok(captions)
    }
}

/// Run `task` over `items` with at most `limit` in flight. Results keep item order.
pub(crate) async fn bounded_join<'a, T, F, Fut>(items: &'a [T], limit: usize, task: F) -> Vec<Fut::Output>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future,
{
    let permits = Semaphore::new(limit.max(1));
    let permits = &permits;
    let task = &task;
    join_all(items.iter().map(|item| async move {
        let _permit = permits.acquire().await;
        task(item).await
    }))
    .await
}

/// Fold per-segment outcomes into a caption map in segment order.
///
/// Caption errors only reach this point under the abort policy and always
/// fail the run. Sampling errors follow `policy`.
pub fn assemble_caption_map(
    segments: &[Segment],
    outcomes: Vec<PipelineResult<Vec<FrameCaption>>>,
    policy: SegmentFailurePolicy,
    logger: &RunLogger,
) -> PipelineResult<(CaptionMap, Vec<SkippedSegment>)> {
    let mut map = CaptionMap::new();
    let mut skipped = Vec::new();

    for (segment, outcome) in segments.iter().zip(outcomes) {
        match outcome {
            Ok(captions) => {
                if !map.insert(segment.key(), captions) {
                    return Err(PipelineError::config(format!(
                        "segment {} produced twice",
                        segment.key()
                    )));
                }
            }
            Err(e) if e.stage() == Some(Stage::Caption) => return Err(e),
            Err(e) => match policy {
                SegmentFailurePolicy::Abort => return Err(e),
                SegmentFailurePolicy::Skip => {
                    let stage = e.stage().unwrap_or(Stage::Sample);
                    logger.log_warning(&format!("skipping {}: {}", segment.key(), e));
                    metrics::record_segment_skipped(stage);
                    skipped.push(SkippedSegment {
                        segment: segment.key(),
                        stage,
                        reason: e.to_string(),
                    });
                }
            },
        }
    }

    Ok((map, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captioner::tests::WidthBackend;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use vscribe_media::MediaError;
    use vscribe_models::SegmentId;

    fn segments(count: u32) -> Vec<Segment> {
        (0..count)
            .map(|i| Segment::new(SegmentId(i), format!("segments/{}", SegmentId(i).file_name())))
            .collect()
    }

    fn sampling_failure(segment: &Segment) -> PipelineError {
        PipelineError::from_media(
            Stage::Sample,
            &segment.path,
            MediaError::ffmpeg_failed("FFmpeg exited with non-zero status", None, Some(1)),
        )
    }

    #[test]
    fn test_assemble_keeps_segment_order() {
        let segments = segments(3);
        let outcomes = vec![
            Ok(vec![FrameCaption::new("frame_0001.jpg", "a")]),
            Ok(vec![]),
            Ok(vec![FrameCaption::new("frame_0001.jpg", "c")]),
        ];
        let logger = RunLogger::new("test");

        let (map, skipped) =
            assemble_caption_map(&segments, outcomes, SegmentFailurePolicy::Skip, &logger).unwrap();
        assert_eq!(
            map.segments(),
            vec!["segment_000.mp4", "segment_001.mp4", "segment_002.mp4"]
        );
        assert_eq!(map.get("segment_001.mp4").unwrap().len(), 0);
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_skip_policy_records_failed_segment() {
        let segments = segments(3);
        let outcomes = vec![
            Ok(vec![FrameCaption::new("frame_0001.jpg", "a")]),
            Err(sampling_failure(&segments[1])),
            Ok(vec![FrameCaption::new("frame_0001.jpg", "c")]),
        ];
        let logger = RunLogger::new("test");

        let (map, skipped) =
            assemble_caption_map(&segments, outcomes, SegmentFailurePolicy::Skip, &logger).unwrap();
        assert_eq!(map.segments(), vec!["segment_000.mp4", "segment_002.mp4"]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].segment, "segment_001.mp4");
        assert_eq!(skipped[0].stage, Stage::Sample);
        assert!(skipped[0].reason.contains("non-zero status"));
    }

    #[test]
    fn test_abort_policy_fails_run() {
        let segments = segments(2);
        let outcomes = vec![Ok(vec![]), Err(sampling_failure(&segments[1]))];
        let logger = RunLogger::new("test");

        let err = assemble_caption_map(&segments, outcomes, SegmentFailurePolicy::Abort, &logger)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalProcess);
        assert!(err.to_string().contains("segment_001.mp4"));
    }

    #[test]
    fn test_caption_abort_is_never_skipped() {
        let segments = segments(1);
        let outcomes = vec![Err(PipelineError::Timeout {
            stage: Stage::Caption,
            after: Duration::from_secs(120),
        })];
        let logger = RunLogger::new("test");

        let err = assemble_caption_map(&segments, outcomes, SegmentFailurePolicy::Skip, &logger)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_missing_video_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            segment_dir: dir.path().join("segments"),
            frames_dir: dir.path().join("frames"),
            captions_path: dir.path().join("captions_output.json"),
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config, Captioner::new(Arc::new(WidthBackend::new()))).unwrap();

        let err = pipeline.run(&dir.path().join("missing.mp4")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(err.stage(), Some(Stage::Segment));
        assert!(!dir.path().join("captions_output.json").exists());
    }

    #[tokio::test]
    async fn test_segment_fan_out_is_bounded() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let segments = segments(8);

        let keys = bounded_join(&segments, 3, |segment| {
            let (in_flight, peak) = (&in_flight, &peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                segment.key()
            }
        })
        .await;

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(keys.len(), 8);
        assert_eq!(keys[0], "segment_000.mp4");
        assert_eq!(keys[7], "segment_007.mp4");

        // A zero limit still makes progress one segment at a time.
        peak.store(0, Ordering::SeqCst);
        let keys = bounded_join(&segments[..2], 0, |segment| {
            let (in_flight, peak) = (&in_flight, &peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                segment.key()
            }
        })
        .await;
        assert_eq!(keys, vec!["segment_000.mp4", "segment_001.mp4"]);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PipelineConfig {
            fps: 0.0,
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(config, Captioner::new(Arc::new(WidthBackend::new())));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
