//! Analysis of a caption map through the text-generation service.

use vscribe_ml_client::{collect_stream_with, Analyzer};
use vscribe_models::{AnalysisResult, CaptionMap};

use crate::error::{PipelineError, PipelineResult, Stage};
use crate::metrics;
use crate::prompt::{build_video_prompt, segment_entry_prompts, PromptTemplate};

/// Run a whole-video analysis of `map`.
///
/// In streaming mode every chunk is handed to `on_chunk` as it arrives; in
/// blocking mode `on_chunk` sees the full text once.
pub async fn analyze_captions<F>(
    analyzer: &Analyzer,
    map: &CaptionMap,
    template: &PromptTemplate,
    streaming: bool,
    mut on_chunk: F,
) -> PipelineResult<AnalysisResult>
where
    F: FnMut(&str),
{
    let prompt = build_video_prompt(map, template);
    run_prompt(analyzer, &prompt, streaming, &mut on_chunk).await
}

/// Keynote summaries, one per non-empty segment, requested sequentially.
pub async fn summarize_segments(
    analyzer: &Analyzer,
    map: &CaptionMap,
    template: &PromptTemplate,
) -> PipelineResult<Vec<(String, AnalysisResult)>> {
    let mut ignore = |_: &str| {};
    let mut summaries = Vec::new();
    for (segment, prompt) in segment_entry_prompts(map, template) {
        let result = run_prompt(analyzer, &prompt, false, &mut ignore).await?;
        summaries.push((segment, result));
    }
    Ok(summaries)
}

async fn run_prompt<F>(
    analyzer: &Analyzer,
    prompt: &str,
    streaming: bool,
    on_chunk: &mut F,
) -> PipelineResult<AnalysisResult>
where
    F: FnMut(&str),
{
    let to_pipeline = |e| PipelineError::from_ml(Stage::Analyze, e);

    if streaming {
        let stream = analyzer.analyze_streaming(prompt).await.map_err(to_pipeline)?;
        let result = collect_stream_with(stream, |chunk| on_chunk(chunk))
            .await
            .map_err(to_pipeline)?;
        metrics::record_analysis_chunks(result.chunks);
        Ok(result)
    } else {
        let text = analyzer.analyze(prompt).await.map_err(to_pipeline)?;
        on_chunk(&text);
        Ok(AnalysisResult::whole(text))
    }
}
