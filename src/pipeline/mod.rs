//! Typed stage pipelines.
//!
//! A [`Pipeline`] is an ordered chain of [`Stage`]s built through
//! [`PipelineBuilder`]. `then` only accepts a stage whose input type equals
//! the current output type, so an ill-typed chain does not compile. Invoking
//! a pipeline runs every stage in order, with no branching; the first failing
//! stage stops the run and is named in the returned [`StageError`].

pub mod composer;
pub mod stage;

pub use composer::Pipelines;
pub use stage::{
    FnStage, GenerateStage, SearchFetchStage, Stage, StageInfo, TemplateStage,
    TranscriptFetchStage,
};

use crate::error::AppError;
use async_trait::async_trait;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, debug_span, info, warn, Instrument};

/// A stage failure, tagged with the stage that produced it.
#[derive(Error, Debug)]
#[error("stage `{stage}` failed: {source}")]
pub struct StageError {
    pub stage: String,
    /// Whether the failing stage was calling the model backend.
    pub calls_backend: bool,
    #[source]
    pub source: AppError,
}

/// Type-erased runner for a chain ending in `O`.
#[async_trait]
trait Runnable<I: Send + 'static, O: Send + 'static>: Send + Sync {
    async fn invoke(&self, input: I) -> Result<O, StageError>;
}

async fn run_stage<S: Stage>(stage: &S, input: S::Input) -> Result<S::Output, StageError> {
    let started = Instant::now();
    let span = debug_span!("stage", name = stage.name(), may_block = stage.may_block());

    match stage.run(input).instrument(span).await {
        Ok(output) => {
            debug!(
                "Stage `{}` finished in {} ms",
                stage.name(),
                started.elapsed().as_millis()
            );
            Ok(output)
        }
        Err(source) => {
            warn!("Stage `{}` failed: {}", stage.name(), source);
            Err(StageError {
                stage: stage.name().to_string(),
                calls_backend: stage.calls_backend(),
                source,
            })
        }
    }
}

struct Single<S>(S);

#[async_trait]
impl<S: Stage> Runnable<S::Input, S::Output> for Single<S> {
    async fn invoke(&self, input: S::Input) -> Result<S::Output, StageError> {
        run_stage(&self.0, input).await
    }
}

struct Then<I: Send + 'static, S: Stage> {
    prev: Box<dyn Runnable<I, S::Input>>,
    next: S,
}

#[async_trait]
impl<I: Send + 'static, S: Stage> Runnable<I, S::Output> for Then<I, S> {
    async fn invoke(&self, input: I) -> Result<S::Output, StageError> {
        let intermediate = self.prev.invoke(input).await?;
        run_stage(&self.next, intermediate).await
    }
}

/// An ordered, type-checked chain of stages from `I` to `O`.
pub struct Pipeline<I: Send + 'static, O: Send + 'static> {
    name: &'static str,
    stages: Vec<StageInfo>,
    runner: Box<dyn Runnable<I, O>>,
}

impl<I: Send + 'static, O: Send + 'static> Pipeline<I, O> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[StageInfo] {
        &self.stages
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Run every stage in order.
    pub async fn run(&self, input: I) -> Result<O, StageError> {
        info!("Running pipeline `{}` ({} stages)", self.name, self.stages.len());
        self.runner.invoke(input).await
    }
}

impl<I: Send + 'static, O: Send + 'static> std::fmt::Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder that grows a pipeline one stage at a time.
pub struct PipelineBuilder<I: Send + 'static, O: Send + 'static> {
    name: &'static str,
    stages: Vec<StageInfo>,
    runner: Box<dyn Runnable<I, O>>,
}

impl<I: Send + 'static, O: Send + 'static> PipelineBuilder<I, O> {
    /// Start a pipeline with its entry stage.
    pub fn start<S>(name: &'static str, first: S) -> Self
    where
        S: Stage<Input = I, Output = O> + 'static,
    {
        Self {
            name,
            stages: vec![StageInfo::of(&first)],
            runner: Box::new(Single(first)),
        }
    }

    /// Append a stage consuming the current output type.
    pub fn then<S>(mut self, next: S) -> PipelineBuilder<I, S::Output>
    where
        S: Stage<Input = O> + 'static,
    {
        self.stages.push(StageInfo::of(&next));
        PipelineBuilder {
            name: self.name,
            stages: self.stages,
            runner: Box::new(Then {
                prev: self.runner,
                next,
            }),
        }
    }

    pub fn build(self) -> Pipeline<I, O> {
        Pipeline {
            name: self.name,
            stages: self.stages,
            runner: self.runner,
        }
    }
}
