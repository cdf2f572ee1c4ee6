//! Stage primitives.
//!
//! A stage turns one typed value into another. Stages are stateless and can
//! be invoked any number of times; the ones that talk to the network or spawn
//! processes report `may_block() == true`.

use crate::backend::Backend;
use crate::config::{PromptTemplate, TemplateInput};
use crate::error::Result;
use crate::sources::{SearchSource, TranscriptDocument, TranscriptSource};
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;

/// One step of a pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Whether the stage performs network or subprocess I/O.
    fn may_block(&self) -> bool {
        false
    }

    /// Whether the stage invokes the language-model backend.
    fn calls_backend(&self) -> bool {
        false
    }

    async fn run(&self, input: Self::Input) -> Result<Self::Output>;
}

/// Static description of a stage, kept by the pipeline for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    pub name: String,
    pub may_block: bool,
    pub input_type: &'static str,
    pub output_type: &'static str,
}

impl StageInfo {
    pub fn of<S: Stage>(stage: &S) -> Self {
        Self {
            name: stage.name().to_string(),
            may_block: stage.may_block(),
            input_type: std::any::type_name::<S::Input>(),
            output_type: std::any::type_name::<S::Output>(),
        }
    }
}

/// A pure, named function stage.
pub struct FnStage<I, O, F> {
    name: &'static str,
    f: F,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O, F> FnStage<I, O, F>
where
    F: Fn(I) -> Result<O> + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self {
            name,
            f,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<I, O, F> Stage for FnStage<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Result<O> + Send + Sync,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, input: I) -> Result<O> {
        (self.f)(input)
    }
}

/// Fetches transcript documents for a video URL.
pub struct TranscriptFetchStage {
    source: Arc<dyn TranscriptSource>,
    include_metadata: bool,
}

impl TranscriptFetchStage {
    pub fn new(source: Arc<dyn TranscriptSource>, include_metadata: bool) -> Self {
        Self {
            source,
            include_metadata,
        }
    }
}

#[async_trait]
impl Stage for TranscriptFetchStage {
    type Input = String;
    type Output = Vec<TranscriptDocument>;

    fn name(&self) -> &str {
        "fetch-transcript"
    }

    fn may_block(&self) -> bool {
        true
    }

    async fn run(&self, url: String) -> Result<Vec<TranscriptDocument>> {
        self.source.fetch(&url, self.include_metadata).await
    }
}

/// Fetches raw search results for a topic.
pub struct SearchFetchStage {
    source: Arc<dyn SearchSource>,
}

impl SearchFetchStage {
    pub fn new(source: Arc<dyn SearchSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Stage for SearchFetchStage {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        "fetch-search-results"
    }

    fn may_block(&self) -> bool {
        true
    }

    async fn run(&self, topic: String) -> Result<String> {
        self.source.search(&topic).await
    }
}

/// Renders a named prompt template.
pub struct TemplateStage {
    name: String,
    template: PromptTemplate,
}

impl TemplateStage {
    pub fn new(template: PromptTemplate) -> Self {
        Self {
            name: format!("template:{}", template.name()),
            template,
        }
    }
}

#[async_trait]
impl Stage for TemplateStage {
    type Input = TemplateInput;
    type Output = String;

    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, input: TemplateInput) -> Result<String> {
        self.template.render(&input)
    }
}

/// Sends a prompt to the resolved backend.
pub struct GenerateStage {
    backend: Arc<dyn Backend>,
}

impl GenerateStage {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Stage for GenerateStage {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        "generate"
    }

    fn may_block(&self) -> bool {
        true
    }

    fn calls_backend(&self) -> bool {
        true
    }

    async fn run(&self, prompt: String) -> Result<String> {
        self.backend.generate(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::error::AppError;
    use crate::test_support::MockBackend;

    #[tokio::test]
    async fn test_fn_stage_applies_function() {
        let stage = FnStage::new("double", |x: u32| Ok(x * 2));
        assert_eq!(stage.run(21).await.unwrap(), 42);
        assert!(!stage.may_block());
    }

    #[tokio::test]
    async fn test_template_stage_reports_missing_key() {
        let stage = TemplateStage::new(Prompts::default().topic);
        assert_eq!(stage.name(), "template:topic");

        let err = stage.run(TemplateInput::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Template { .. }));
    }

    #[tokio::test]
    async fn test_generate_stage_delegates_to_backend() {
        let backend = Arc::new(MockBackend::fixed("generated"));
        let stage = GenerateStage::new(backend.clone());

        assert_eq!(stage.run("prompt".to_string()).await.unwrap(), "generated");
        assert_eq!(backend.prompts(), vec!["prompt".to_string()]);
        assert!(stage.may_block());
        assert!(stage.calls_backend());
    }

    #[test]
    fn test_stage_info_records_types() {
        let info = StageInfo::of(&TemplateStage::new(Prompts::default().summary));
        assert_eq!(info.name, "template:summary");
        assert!(!info.may_block);
        assert!(info.input_type.ends_with("TemplateInput"));
        assert_eq!(info.output_type, std::any::type_name::<String>());
    }
}
