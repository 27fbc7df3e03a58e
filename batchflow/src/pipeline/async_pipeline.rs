//! Pipeline orchestrator that dispatches every stage call to an executor.

use super::engine::PipelineCore;
use super::executor::Executor;
use super::report::{RunOutcome, RunReport};
use super::state::PipelineState;
use super::Instrumented;
use crate::context::RunContext;
use crate::errors::PipelineError;
use crate::metrics::MetricsCollector;
use crate::observability::run_span;
use crate::operators::Envelope;
use futures::stream::{self, TryStreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{warn, Instrument};

/// A pipeline whose source pulls, operator calls and before-hooks run as
/// blocking tasks on an [`Executor`]. After-hooks run on the task awaiting
/// [`run`](Self::run).
///
/// Each batch's stages are chained, every step awaiting the previous one,
/// and the whole chain is awaited before the next pull: at most one batch is
/// ever in flight.
pub struct AsyncPipeline<T> {
    core: Arc<PipelineCore<T>>,
    executor: Executor,
}

impl<T: Send + 'static> AsyncPipeline<T> {
    pub(crate) fn from_core(core: PipelineCore<T>, executor: Executor) -> Self {
        Self {
            core: Arc::new(core),
            executor,
        }
    }

    /// Runs the pipeline to completion.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidState`] if the pipeline already ran
    /// - [`PipelineError::Hook`] if a before-hook failed
    /// - [`PipelineError::Operator`] if an operator failed unrecovered
    /// - [`PipelineError::Interrupted`] after [`shutdown_now`](Self::shutdown_now)
    /// - [`PipelineError::Executor`] if a dispatched task was cancelled
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let span = run_span(&self.core.context);
        self.run_in_span().instrument(span).await
    }

    async fn run_in_span(&self) -> Result<RunReport, PipelineError> {
        self.core.start()?;

        let core = self.core.clone();
        if let Err(e) = self.executor.dispatch(move || core.run_before_hooks()).await {
            self.fail_if_running();
            return Err(e);
        }

        let result = tokio::select! {
            biased;
            () = self.core.shutdown.immediate() => Err(PipelineError::Interrupted(
                self.core
                    .shutdown
                    .reason()
                    .unwrap_or_else(|| "shutdown requested".to_string()),
            )),
            outcome = self.drive() => outcome,
        };

        // Concluded on this task: after shutdown_now the abandoned stage may
        // still hold the only blocking thread.
        self.core.conclude(result)
    }

    /// Drives a run to completion from synchronous code.
    ///
    /// Must not be called from inside an async runtime.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn run_blocking(&self) -> Result<RunReport, PipelineError> {
        self.executor.handle().block_on(self.run())
    }

    async fn drive(&self) -> Result<RunOutcome, PipelineError> {
        loop {
            if self.core.shutdown.is_requested() {
                return Ok(RunOutcome::Interrupted);
            }

            let core = self.core.clone();
            let Some(batch) = self.executor.dispatch(move || core.pull()).await? else {
                return Ok(RunOutcome::Completed);
            };
            for envelope in self.core.accept(batch) {
                self.run_chain(envelope).await?;
            }
        }
    }

    async fn run_chain(&self, envelope: Envelope) -> Result<Envelope, PipelineError> {
        let executor = &self.executor;
        stream::iter((0..self.core.stages.len()).map(Ok::<usize, PipelineError>))
            .try_fold(envelope, |envelope, index| {
                let core = self.core.clone();
                async move {
                    executor
                        .dispatch(move || core.run_stage(index, envelope))
                        .await
                }
            })
            .await
    }

    /// A dispatched task died before the run reached a terminal state.
    fn fail_if_running(&self) {
        if !self.core.state.current().is_terminal() {
            warn!(
                pipeline = self.core.context.pipeline(),
                run_id = %self.core.context.run_id(),
                "Pipeline task failed before reaching a terminal state"
            );
            self.core.context.mark_finished();
            self.core.state.finish(PipelineState::Failed);
        }
    }

    /// Requests a graceful stop: the in-flight batch finishes and no new
    /// batch is pulled.
    pub fn shutdown(&self) {
        self.core.request_shutdown(false, "shutdown requested");
    }

    /// Requests an immediate stop.
    ///
    /// The orchestrator stops awaiting the in-flight batch and its remaining
    /// stages never run. A stage already executing on a blocking thread
    /// finishes in the background and its result is discarded.
    pub fn shutdown_now(&self) {
        self.core.request_shutdown(true, "shutdown_now requested");
    }

    /// Waits until the run ends or `timeout` elapses.
    ///
    /// Returns true if a terminal state was observed.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        self.core.state.wait_terminal_async(timeout).await
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

    /// Returns the executor.
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.executor
    }
}

impl<T> Instrumented for AsyncPipeline<T> {
    fn metrics(&self) -> &MetricsCollector {
        &self.core.metrics
    }

    fn context(&self) -> &RunContext {
        &self.core.context
    }
}

impl<T> fmt::Debug for AsyncPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncPipeline")
            .field("name", &self.core.context.pipeline())
            .field("state", &self.core.state)
            .field("stages", &self.core.stages.len())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
