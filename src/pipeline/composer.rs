//! The three pipelines a session runs: summarize, topic extraction and deep
//! search. Built once from settings and collaborators, then reused.

use super::{
    FnStage, GenerateStage, Pipeline, PipelineBuilder, SearchFetchStage, TemplateStage,
    TranscriptFetchStage,
};
use crate::backend::Backend;
use crate::config::{Prompts, Settings, TemplateInput};
use crate::error::{AppError, Result};
use crate::sources::{SearchSource, TranscriptDocument, TranscriptSource};
use std::sync::Arc;

/// Highlight instruction when video sources should be flagged.
pub const HIGHLIGHT_VIDEOS: &str =
    "true if the source is a video platform (YouTube, Vimeo, Twitch, etc.), otherwise false";

/// Highlight instruction when highlighting is turned off.
pub const HIGHLIGHT_NONE: &str = "always false";

/// Fully wired pipelines for one session.
#[derive(Debug)]
pub struct Pipelines {
    pub summarize: Pipeline<String, String>,
    pub extract_topic: Pipeline<String, String>,
    pub deep_search: Pipeline<String, String>,
}

impl Pipelines {
    pub fn build(
        settings: &Settings,
        prompts: &Prompts,
        backend: Arc<dyn Backend>,
        transcripts: Arc<dyn TranscriptSource>,
        search: Arc<dyn SearchSource>,
    ) -> Self {
        Self {
            summarize: summarize_pipeline(
                prompts,
                backend.clone(),
                transcripts,
                settings.video.add_video_info,
            ),
            extract_topic: extract_topic_pipeline(prompts, backend.clone()),
            deep_search: deep_search_pipeline(
                prompts,
                backend,
                search,
                settings.deep_search.highlight_video_sources,
            ),
        }
    }
}

fn first_document_text(documents: Vec<TranscriptDocument>) -> Result<String> {
    documents
        .into_iter()
        .next()
        .map(|doc| doc.text)
        .ok_or_else(|| AppError::Source("transcript service returned no documents".to_string()))
}

/// URL → summary.
pub fn summarize_pipeline(
    prompts: &Prompts,
    backend: Arc<dyn Backend>,
    transcripts: Arc<dyn TranscriptSource>,
    include_metadata: bool,
) -> Pipeline<String, String> {
    PipelineBuilder::start(
        "summarize",
        TranscriptFetchStage::new(transcripts, include_metadata),
    )
    .then(FnStage::new("first-document-text", first_document_text))
    .then(FnStage::new("project-transcript", |text: String| {
        Ok(TemplateInput::new().with("transcript", text))
    }))
    .then(TemplateStage::new(prompts.summary.clone()))
    .then(GenerateStage::new(backend))
    .build()
}

/// Summary → topic phrase.
pub fn extract_topic_pipeline(prompts: &Prompts, backend: Arc<dyn Backend>) -> Pipeline<String, String> {
    PipelineBuilder::start(
        "extract-topic",
        FnStage::new("project-summary", |summary: String| {
            Ok(TemplateInput::new().with("summary", summary))
        }),
    )
    .then(TemplateStage::new(prompts.topic.clone()))
    .then(GenerateStage::new(backend))
    .build()
}

/// Topic → normalized source list, as raw backend text.
pub fn deep_search_pipeline(
    prompts: &Prompts,
    backend: Arc<dyn Backend>,
    search: Arc<dyn SearchSource>,
    highlight_video_sources: bool,
) -> Pipeline<String, String> {
    let highlight_rule = if highlight_video_sources {
        HIGHLIGHT_VIDEOS
    } else {
        HIGHLIGHT_NONE
    };

    PipelineBuilder::start("deep-search", SearchFetchStage::new(search))
        .then(FnStage::new("project-search-results", move |raw: String| {
            Ok(TemplateInput::new()
                .with("raw", raw)
                .with("highlight_rule", highlight_rule))
        }))
        .then(TemplateStage::new(prompts.normalize.clone()))
        .then(GenerateStage::new(backend))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{settings, MockBackend, MockSearch, MockTranscripts};

    fn build(backend: Arc<MockBackend>, transcripts: Arc<MockTranscripts>, search: Arc<MockSearch>) -> Pipelines {
        Pipelines::build(&settings(), &Prompts::default(), backend, transcripts, search)
    }

    #[test]
    fn test_stage_order() {
        let pipelines = build(
            Arc::new(MockBackend::echo()),
            Arc::new(MockTranscripts::with_text("T")),
            Arc::new(MockSearch::with_results("R")),
        );

        assert_eq!(
            pipelines.summarize.stage_names(),
            vec![
                "fetch-transcript",
                "first-document-text",
                "project-transcript",
                "template:summary",
                "generate"
            ]
        );
        assert_eq!(
            pipelines.extract_topic.stage_names(),
            vec!["project-summary", "template:topic", "generate"]
        );
        assert_eq!(
            pipelines.deep_search.stage_names(),
            vec![
                "fetch-search-results",
                "project-search-results",
                "template:normalize",
                "generate"
            ]
        );

        let blocking: Vec<_> = pipelines
            .summarize
            .stages()
            .iter()
            .filter(|s| s.may_block)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(blocking, vec!["fetch-transcript", "generate"]);
    }

    #[tokio::test]
    async fn test_summarize_passes_transcript_to_prompt() {
        let backend = Arc::new(MockBackend::echo());
        let transcripts = Arc::new(MockTranscripts::with_text("Alice discusses rust borrow checking."));
        let pipelines = build(backend.clone(), transcripts.clone(), Arc::new(MockSearch::with_results("R")));

        let summary = pipelines.summarize.run("https://youtu.be/dQw4w9WgXcQ".to_string()).await.unwrap();
        assert!(summary.contains("Alice discusses rust borrow checking."));
        assert_eq!(transcripts.calls(), vec![("https://youtu.be/dQw4w9WgXcQ".to_string(), true)]);
        assert_eq!(backend.prompts().len(), 1);
        assert!(backend.prompts()[0].starts_with("Summarize the following YouTube transcript"));
    }

    #[tokio::test]
    async fn test_summarize_without_documents_fails_in_projection() {
        let pipelines = build(
            Arc::new(MockBackend::echo()),
            Arc::new(MockTranscripts::empty()),
            Arc::new(MockSearch::with_results("R")),
        );

        let err = pipelines.summarize.run("u".to_string()).await.unwrap_err();
        assert_eq!(err.stage, "first-document-text");
        assert!(matches!(err.source, AppError::Source(_)));
    }

    #[tokio::test]
    async fn test_deep_search_highlight_rule_follows_settings() {
        let prompts = Prompts::default();

        for (flag, rule) in [(true, HIGHLIGHT_VIDEOS), (false, HIGHLIGHT_NONE)] {
            let backend = Arc::new(MockBackend::fixed("[]"));
            let pipeline = deep_search_pipeline(
                &prompts,
                backend.clone(),
                Arc::new(MockSearch::with_results("Result A - site.com")),
                flag,
            );

            assert_eq!(pipeline.run("rust".to_string()).await.unwrap(), "[]");
            let prompt = &backend.prompts()[0];
            assert!(prompt.contains("Result A - site.com"));
            assert!(prompt.contains(&format!("\"highlight\": {}", rule)));
        }
    }

    #[tokio::test]
    async fn test_extract_topic_uses_summary() {
        let backend = Arc::new(MockBackend::fixed("Rust borrow checking"));
        let pipeline = extract_topic_pipeline(&Prompts::default(), backend.clone());

        let topic = pipeline.run("A summary about lifetimes.".to_string()).await.unwrap();
        assert_eq!(topic, "Rust borrow checking");
        assert!(backend.prompts()[0].contains("Summary:\nA summary about lifetimes."));
    }
}
