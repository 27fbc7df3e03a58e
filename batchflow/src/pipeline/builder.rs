//! Typed pipeline assembly.

use super::async_pipeline::AsyncPipeline;
use super::engine::PipelineCore;
use super::executor::Executor;
use super::shutdown::ShutdownSignal;
use super::state::StateMachine;
use super::sync_pipeline::Pipeline;
use crate::config::PipelineConfig;
use crate::context::RunContext;
use crate::errors::ConfigError;
use crate::hooks::{AfterHook, BeforeHook, HookChain};
use crate::metrics::MetricsCollector;
use crate::operators::{Sink, SinkStage, Source, Stage, Transform, TransformStage};
use crate::splitter::{BatchSplitter, FixedSizeSplitter};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

const DEFAULT_NAME: &str = "pipeline";

/// Builder for [`Pipeline`] and [`AsyncPipeline`].
///
/// `T` is the source's item type and `C` the item type at the end of the
/// chain so far; each transform changes `C`, so a sink or transform that
/// does not accept the current item type is a compile error.
pub struct PipelineBuilder<T, C> {
    name: String,
    source: Box<dyn Source<T>>,
    stages: Vec<Box<dyn Stage>>,
    splitter: Option<Box<dyn BatchSplitter<T>>>,
    hooks: HookChain,
    properties: HashMap<String, Value>,
    _item: PhantomData<fn() -> C>,
}

impl<T: Send + 'static> PipelineBuilder<T, T> {
    /// Starts a chain reading from `source`.
    pub fn new(source: impl Source<T> + 'static) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            source: Box::new(source),
            stages: Vec::new(),
            splitter: None,
            hooks: HookChain::default(),
            properties: HashMap::new(),
            _item: PhantomData,
        }
    }
}

impl<T, C> PipelineBuilder<T, C>
where
    T: Send + 'static,
    C: Send + 'static,
{
    /// Sets the pipeline name used in logs and the run context.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends a transform.
    pub fn transform<O, P>(self, transform: P) -> PipelineBuilder<T, O>
    where
        O: Send + 'static,
        P: Transform<C, O> + 'static,
    {
        let mut stages = self.stages;
        stages.push(Box::new(TransformStage::<C, O, P>::new(transform)));

        PipelineBuilder {
            name: self.name,
            source: self.source,
            stages,
            splitter: self.splitter,
            hooks: self.hooks,
            properties: self.properties,
            _item: PhantomData,
        }
    }

    /// Appends a sink. The batch continues unchanged to the next operator.
    #[must_use]
    pub fn sink<S>(mut self, sink: S) -> Self
    where
        S: Sink<C> + 'static,
    {
        self.stages.push(Box::new(SinkStage::<C, S>::new(sink)));
        self
    }

    /// Sets the splitter applied to every pulled batch.
    #[must_use]
    pub fn splitter(mut self, splitter: impl BatchSplitter<T> + 'static) -> Self {
        self.splitter = Some(Box::new(splitter));
        self
    }

    /// Registers a before-hook. Hooks run in registration order.
    #[must_use]
    pub fn before_hook(mut self, hook: impl BeforeHook + 'static) -> Self {
        self.hooks.add_before(Arc::new(hook));
        self
    }

    /// Registers an after-hook. Hooks run in registration order.
    #[must_use]
    pub fn after_hook(mut self, hook: impl AfterHook + 'static) -> Self {
        self.hooks.add_after(Arc::new(hook));
        self
    }

    /// Seeds a property into the run context.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Applies the name and split size of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured split size is zero.
    pub fn with_config(mut self, config: &PipelineConfig) -> Result<Self, ConfigError> {
        self.name.clone_from(&config.name);
        if let Some(size) = config.split_size {
            self.splitter = Some(Box::new(FixedSizeSplitter::new(size)?));
        }
        Ok(self)
    }

    fn into_core(self) -> PipelineCore<T> {
        PipelineCore {
            source: self.source,
            stages: self.stages,
            splitter: self.splitter,
            hooks: self.hooks,
            context: RunContext::new(self.name).with_properties(self.properties),
            metrics: MetricsCollector::new(),
            state: StateMachine::new(),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Builds a single-threaded pipeline.
    pub fn build(self) -> Pipeline<T> {
        Pipeline::from_core(self.into_core())
    }

    /// Builds a pipeline that dispatches stages onto `executor`.
    pub fn build_async(self, executor: Executor) -> AsyncPipeline<T> {
        AsyncPipeline::from_core(self.into_core(), executor)
    }
}

impl<T, C> fmt::Debug for PipelineBuilder<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("source", &self.source.name())
            .field(
                "stages",
                &self.stages.iter().map(|s| format!("{}:{}", s.kind(), s.name())).collect::<Vec<_>>(),
            )
            .field("split", &self.splitter.is_some())
            .field("hooks", &self.hooks)
            .finish()
    }
}
