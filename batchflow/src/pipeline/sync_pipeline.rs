//! Single-threaded pipeline orchestrator.

use super::builder::PipelineBuilder;
use super::engine::PipelineCore;
use super::report::{RunOutcome, RunReport};
use super::state::PipelineState;
use super::Instrumented;
use crate::context::RunContext;
use crate::errors::PipelineError;
use crate::metrics::MetricsCollector;
use crate::observability::run_span;
use crate::operators::Source;
use std::fmt;
use std::time::Duration;

/// A pipeline driven by one call stack.
///
/// `run` pulls a batch, threads it through every operator, and repeats until
/// the source is exhausted. Retry waits block the calling thread. A pipeline
/// runs at most once.
///
/// `shutdown` and `await_termination` take `&self` and may be called from
/// other threads while `run` is in progress.
pub struct Pipeline<T> {
    core: PipelineCore<T>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Starts building a pipeline that reads from `source`.
    pub fn builder(source: impl Source<T> + 'static) -> PipelineBuilder<T, T> {
        PipelineBuilder::new(source)
    }

    pub(crate) fn from_core(core: PipelineCore<T>) -> Self {
        Self { core }
    }

    /// Runs the pipeline to completion.
    ///
    /// Returns the run report when the source is exhausted or a graceful
    /// shutdown stopped the run.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidState`] if the pipeline already ran
    /// - [`PipelineError::Hook`] if a before-hook failed
    /// - [`PipelineError::Operator`] if an operator failed unrecovered
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let _span = run_span(&self.core.context).entered();
        self.core.start()?;
        self.core.run_before_hooks()?;
        let result = self.drive();
        self.core.conclude(result)
    }

    fn drive(&self) -> Result<RunOutcome, PipelineError> {
        loop {
            if self.core.shutdown.is_requested() {
                return Ok(RunOutcome::Interrupted);
            }
            let Some(batch) = self.core.pull()? else {
                return Ok(RunOutcome::Completed);
            };
            for envelope in self.core.accept(batch) {
                self.core.run_chain(envelope)?;
            }
        }
    }

    /// Requests a graceful stop: the in-flight batch finishes and no new
    /// batch is pulled.
    pub fn shutdown(&self) {
        self.core.request_shutdown(false, "shutdown requested");
    }

    /// Blocks until the run ends or `timeout` elapses.
    ///
    /// Returns true if a terminal state was observed.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.core.state.wait_terminal(timeout)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.core.context.pipeline()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.core.state.current()
    }
}

impl<T> Instrumented for Pipeline<T> {
    fn metrics(&self) -> &MetricsCollector {
        &self.core.metrics
    }

    fn context(&self) -> &RunContext {
        &self.core.context
    }
}

impl<T> fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.core.context.pipeline())
            .field("state", &self.core.state)
            .field("stages", &self.core.stages.len())
            .field("hooks", &self.core.hooks)
            .finish_non_exhaustive()
    }
}
