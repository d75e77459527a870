//! Command line entry point.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use vscribe_ml_client::{Analyzer, OllamaCaptionBackend};
use vscribe_models::CaptionMap;
use vscribe_storage::CaptionStore;
use vscribe_worker::{
    analyze_captions, init_tracing, summarize_segments, CaptionFailurePolicy, Captioner, Pipeline,
    PipelineConfig, PipelineError, PromptTemplate, SegmentFailurePolicy,
};

#[derive(Debug, Parser)]
#[command(
    name = "vscribe",
    version,
    about = "Caption a video frame by frame and analyze the captions with a language model"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Segment, sample and caption a video, writing the caption artifact.
    Caption {
        /// Source video path.
        video: PathBuf,

        #[command(flatten)]
        options: CaptionOptions,
    },

    /// Analyze an existing caption artifact.
    Analyze {
        /// Caption artifact to analyze.
        #[arg(long)]
        captions: Option<PathBuf>,

        #[command(flatten)]
        options: AnalyzeOptions,
    },

    /// Caption a video, then analyze the result.
    Run {
        /// Source video path.
        video: PathBuf,

        #[command(flatten)]
        caption: CaptionOptions,

        #[command(flatten)]
        analyze: AnalyzeOptions,
    },
}

#[derive(Debug, Args, Clone, Default)]
struct CaptionOptions {
    /// Segment length in seconds.
    #[arg(long)]
    segment_secs: Option<f64>,

    /// Frames sampled per second of video.
    #[arg(long)]
    fps: Option<f64>,

    /// Where to write the caption artifact.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Captioning model.
    #[arg(long)]
    caption_model: Option<String>,

    /// Caption requests in flight at once.
    #[arg(long)]
    max_caption_parallel: Option<usize>,

    /// What to do when a frame cannot be captioned (sentinel, abort).
    #[arg(long)]
    caption_policy: Option<CaptionFailurePolicy>,

    /// What to do when a segment cannot be sampled (skip, abort).
    #[arg(long)]
    segment_policy: Option<SegmentFailurePolicy>,
}

#[derive(Debug, Args, Clone, Default)]
struct AnalyzeOptions {
    /// Print the analysis as it is generated.
    #[arg(long, conflicts_with = "per_segment")]
    stream: bool,

    /// Summarize each segment separately instead of the whole video.
    #[arg(long)]
    per_segment: bool,

    /// Analysis model.
    #[arg(long)]
    model: Option<String>,

    /// Prompt template file containing a {captions} placeholder.
    #[arg(long)]
    template: Option<PathBuf>,
}

impl CaptionOptions {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(secs) = self.segment_secs {
            config.segment_length_secs = secs;
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(output) = &self.output {
            config.captions_path = output.clone();
        }
        if let Some(model) = &self.caption_model {
            config.caption.model = model.clone();
        }
        if let Some(n) = self.max_caption_parallel {
            config.max_caption_parallel = n;
        }
        if let Some(policy) = self.caption_policy {
            config.caption_policy = policy;
        }
        if let Some(policy) = self.segment_policy {
            config.segment_policy = policy;
        }
    }
}

async fn caption(video: PathBuf, options: &CaptionOptions, config: &mut PipelineConfig) -> anyhow::Result<CaptionMap> {
    options.apply(config);
    vscribe_media::check_ffmpeg().context("the caption command needs ffmpeg")?;

    let backend = OllamaCaptionBackend::new(config.caption.clone())?;
    let captioner = Captioner::from_config(Arc::new(backend), config);
    let pipeline = Pipeline::new(config.clone(), captioner)?;

    let report = pipeline.run(&video).await?;
    for skipped in &report.skipped {
        warn!("Segment {} skipped during {}: {}", skipped.segment, skipped.stage, skipped.reason);
    }
    info!(
        run_id = %report.run_id,
        "Captioned {} segments ({} frames, {} failed) -> {}",
        report.caption_map.len(),
        report.caption_map.frame_count(),
        report.failed_frames,
        report.artifact_path.display()
    );
    Ok(report.caption_map)
}

async fn analyze(map: &CaptionMap, options: &AnalyzeOptions, config: &PipelineConfig) -> anyhow::Result<()> {
    let mut analyzer_config = config.analyzer.clone();
    if let Some(model) = &options.model {
        analyzer_config.model = model.clone();
    }
    let analyzer = Analyzer::new(analyzer_config)?;

    if !matches!(analyzer.health_check().await, Ok(true)) {
        warn!("Analysis service at {} did not answer the health check", config.analyzer.base_url);
    }
    if map.is_empty() {
        warn!("Caption map is empty; the prompt will contain no captions");
    }

    if options.per_segment {
        let template = match &options.template {
            Some(path) => load_template(path).await?,
            None => PromptTemplate::segment_keynotes(),
        };
        for (segment, summary) in summarize_segments(&analyzer, map, &template).await? {
            println!("Segment: {segment}");
            println!("{}\n", summary.text);
        }
        return Ok(());
    }

    let template = match &options.template {
        Some(path) => load_template(path).await?,
        None => PromptTemplate::activity_assessment(),
    };

    info!("Sending {} captions to {}", map.frame_count(), analyzer.model());
    let mut stdout = std::io::stdout();
    let result = if options.stream {
        analyze_captions(&analyzer, map, &template, true, |chunk| {
            // Output is best effort; a closed pipe should not abort the analysis.
            let _ = write!(stdout, "{chunk}");
            let _ = stdout.flush();
        })
        .await?
    } else {
        let result = analyze_captions(&analyzer, map, &template, false, |_| {}).await?;
        print!("{}", result.text);
        result
    };
    println!();
    info!("Analysis complete ({} characters, {} chunks)", result.text.len(), result.chunks);
    Ok(())
}

async fn load_template(path: &Path) -> anyhow::Result<PromptTemplate> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading prompt template {}", path.display()))?;
    Ok(PromptTemplate::new(text)?)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = PipelineConfig::from_env();

    match cli.command {
        Commands::Caption { video, options } => {
            caption(video, &options, &mut config).await?;
        }
        Commands::Analyze { captions, options } => {
            let path = captions.unwrap_or_else(|| config.captions_path.clone());
            let map = CaptionStore::new(path)
                .load()
                .await
                .map_err(PipelineError::from_storage)?;
            analyze(&map, &options, &config).await?;
        }
        Commands::Run {
            video,
            caption: caption_options,
            analyze: analyze_options,
        } => {
            let map = caption(video, &caption_options, &mut config).await?;
            analyze(&map, &analyze_options, &config).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["vscribe", "caption", "clip.mp4", "--fps", "2", "--caption-policy", "abort"])
            .unwrap();
        match cli.command {
            Commands::Caption { video, options } => {
                assert_eq!(video, PathBuf::from("clip.mp4"));
                assert_eq!(options.fps, Some(2.0));
                assert_eq!(options.caption_policy, Some(CaptionFailurePolicy::Abort));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["vscribe", "analyze", "--captions", "out.json", "--stream"]).unwrap();
        assert!(matches!(cli.command, Commands::Analyze { options: AnalyzeOptions { stream: true, .. }, .. }));
    }

    #[test]
    fn test_cli_rejects_stream_with_per_segment() {
        let err = Cli::try_parse_from(["vscribe", "analyze", "--captions", "out.json", "--stream", "--per-segment"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);

        assert!(Cli::try_parse_from(["vscribe", "run", "clip.mp4", "--per-segment", "--stream"]).is_err());
        assert!(Cli::try_parse_from(["vscribe", "analyze", "--captions", "out.json", "--per-segment"]).is_ok());
    }

    #[test]
    fn test_cli_rejects_unknown_policy() {
        assert!(Cli::try_parse_from(["vscribe", "caption", "clip.mp4", "--segment-policy", "retry"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = PipelineConfig::default();
        let options = CaptionOptions {
            segment_secs: Some(5.0),
            output: Some(PathBuf::from("out/captions.json")),
            segment_policy: Some(SegmentFailurePolicy::Abort),
            ..CaptionOptions::default()
        };
        options.apply(&mut config);
        assert_eq!(config.segment_length_secs, 5.0);
        assert_eq!(config.captions_path, PathBuf::from("out/captions.json"));
        assert_eq!(config.segment_policy, SegmentFailurePolicy::Abort);
        assert_eq!(config.fps, 3.0);
    }
}
