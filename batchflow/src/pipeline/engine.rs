//! Run logic shared by [`Pipeline`](super::Pipeline) and
//! [`AsyncPipeline`](super::AsyncPipeline).

use super::report::{RunOutcome, RunReport};
use super::shutdown::ShutdownSignal;
use super::state::{PipelineState, StateMachine};
use crate::context::RunContext;
use crate::errors::{OperatorError, PipelineError};
use crate::hooks::{HookChain, HookPath};
use crate::metrics::{MetricsCollector, OperationTimer};
use crate::operators::{Batch, Envelope, Source, Stage};
use crate::splitter::BatchSplitter;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info};

/// An assembled pipeline and the state of its single run.
pub(crate) struct PipelineCore<T> {
    pub(crate) source: Box<dyn Source<T>>,
    pub(crate) stages: Vec<Box<dyn Stage>>,
    pub(crate) splitter: Option<Box<dyn BatchSplitter<T>>>,
    pub(crate) hooks: HookChain,
    pub(crate) context: RunContext,
    pub(crate) metrics: MetricsCollector,
    pub(crate) state: StateMachine,
    pub(crate) shutdown: ShutdownSignal,
}

impl<T: Send + 'static> PipelineCore<T> {
    /// Moves to `Running` and stamps the start time.
    pub(crate) fn start(&self) -> Result<(), PipelineError> {
        self.state.begin()?;
        self.context.mark_started();
        info!(
            pipeline = self.context.pipeline(),
            run_id = %self.context.run_id(),
            stages = self.stages.len(),
            hooks = self.hooks.len(),
            "Pipeline started"
        );
        Ok(())
    }

    /// Runs before-hooks; on failure the run ends `Failed` with no after-hooks.
    pub(crate) fn run_before_hooks(&self) -> Result<(), PipelineError> {
        self.hooks.run_before(&self.context).map_err(|e| {
            error!(
                pipeline = self.context.pipeline(),
                run_id = %self.context.run_id(),
                error = %e,
                "Pipeline aborted by before hook"
            );
            self.context.mark_finished();
            self.state.finish(PipelineState::Failed);
            e
        })
    }

    /// Pulls the next batch, recording the call in metrics.
    ///
    /// Empty batches are normalized to end-of-stream.
    pub(crate) fn pull(&self) -> Result<Option<Batch<T>>, PipelineError> {
        let name = self.source.name();
        let timer = OperationTimer::start(name);
        let result = guarded(|| self.source.next_batch(&self.context));
        let elapsed = timer.finish();

        match result {
            Ok(batch) => {
                self.metrics.record_success(name, elapsed);
                Ok(batch.filter(|b| !b.is_empty()))
            }
            Err(e) => {
                self.metrics.record_failure(name, elapsed);
                Err(self.operator_failed(name, e))
            }
        }
    }

    /// Counts a pulled batch and applies the splitter.
    pub(crate) fn accept(&self, batch: Batch<T>) -> Vec<Envelope> {
        self.context.record_batch(batch.len());
        let batch_no = self.context.batch_count();

        match &self.splitter {
            Some(splitter) if splitter.should_split(&batch) => {
                let parts = splitter.split(batch);
                debug!(
                    pipeline = self.context.pipeline(),
                    batch = batch_no,
                    parts = parts.len(),
                    "Split batch"
                );
                parts
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .map(Envelope::new)
                    .collect()
            }
            _ => {
                debug!(
                    pipeline = self.context.pipeline(),
                    batch = batch_no,
                    records = batch.len(),
                    "Pulled batch"
                );
                vec![Envelope::new(batch)]
            }
        }
    }

    /// Runs one stage, recording the call in metrics.
    pub(crate) fn run_stage(&self, index: usize, input: Envelope) -> Result<Envelope, PipelineError> {
        let stage = &self.stages[index];
        let name = stage.name();
        debug!(operator = name, kind = %stage.kind(), records = input.len(), "Running operator");
        let timer = OperationTimer::start(name);
        let result = guarded(|| stage.run(input, &self.context));
        let elapsed = timer.finish();

        match result {
            Ok(output) => {
                self.metrics.record_success(name, elapsed);
                Ok(output)
            }
            Err(e) => {
                self.metrics.record_failure(name, elapsed);
                Err(self.operator_failed(name, e))
            }
        }
    }

    /// Threads one batch through every stage in order.
    pub(crate) fn run_chain(&self, mut envelope: Envelope) -> Result<Envelope, PipelineError> {
        for index in 0..self.stages.len() {
            envelope = self.run_stage(index, envelope)?;
        }
        Ok(envelope)
    }

    fn operator_failed(&self, name: &str, source: OperatorError) -> PipelineError {
        error!(
            pipeline = self.context.pipeline(),
            run_id = %self.context.run_id(),
            operator = name,
            error = %source,
            "Operator failed"
        );
        PipelineError::operator(name, source)
    }

    /// Runs after-hooks on the path matching `result` and enters the
    /// terminal state.
    ///
    /// `Interrupted` errors take the interrupted path and end `Stopped`.
    pub(crate) fn conclude(
        &self,
        result: Result<RunOutcome, PipelineError>,
    ) -> Result<RunReport, PipelineError> {
        self.context.mark_finished();

        match result {
            Ok(RunOutcome::Completed) => {
                self.hooks
                    .run_after(&self.context, &self.metrics, HookPath::Success);
                self.state.finish(PipelineState::Stopped);
                info!(
                    pipeline = self.context.pipeline(),
                    run_id = %self.context.run_id(),
                    batches = self.context.batch_count(),
                    records = self.context.record_count(),
                    elapsed_ms = self.context.elapsed().as_millis() as u64,
                    "Pipeline completed"
                );
                Ok(self.report(RunOutcome::Completed))
            }
            Ok(RunOutcome::Interrupted) => {
                self.interrupt();
                Ok(self.report(RunOutcome::Interrupted))
            }
            Err(e @ PipelineError::Interrupted(_)) => {
                self.interrupt();
                Err(e)
            }
            Err(e) => {
                self.hooks
                    .run_after(&self.context, &self.metrics, HookPath::Failure(&e));
                self.state.finish(PipelineState::Failed);
                Err(e)
            }
        }
    }

    fn interrupt(&self) {
        self.state.request_stop();
        self.hooks
            .run_after(&self.context, &self.metrics, HookPath::Interrupted);
        self.state.finish(PipelineState::Stopped);
        info!(
            pipeline = self.context.pipeline(),
            run_id = %self.context.run_id(),
            batches = self.context.batch_count(),
            reason = self.shutdown.reason().as_deref().unwrap_or("unspecified"),
            "Pipeline interrupted"
        );
    }

    fn report(&self, outcome: RunOutcome) -> RunReport {
        RunReport::capture(&self.context, &self.metrics, outcome, self.state.current())
    }

    /// Records a shutdown request and moves `Running -> Stopping`.
    pub(crate) fn request_shutdown(&self, immediate: bool, reason: &str) {
        if immediate {
            self.shutdown.request_now(reason);
        } else {
            self.shutdown.request(reason);
        }
        if self.state.request_stop() {
            info!(
                pipeline = self.context.pipeline(),
                run_id = %self.context.run_id(),
                immediate,
                "Shutdown requested"
            );
        }
    }
}

/// Runs one operator call, turning a panic into a fatal operator error so
/// the run still reaches a terminal state.
fn guarded<R>(call: impl FnOnce() -> Result<R, OperatorError>) -> Result<R, OperatorError> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        Err(OperatorError::fatal(format!(
            "operator panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic payload"
    }
}
