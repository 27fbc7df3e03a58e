//! Built-in hooks.

use super::{AfterHook, BeforeHook};
use crate::context::RunContext;
use crate::errors::PipelineError;
use crate::metrics::MetricsCollector;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

type OutcomeFn = Arc<dyn Fn(&RunContext, &MetricsCollector) -> anyhow::Result<()> + Send + Sync>;
type FailureFn =
    Arc<dyn Fn(&RunContext, &MetricsCollector, &PipelineError) -> anyhow::Result<()> + Send + Sync>;

/// A closure-backed before-hook.
pub struct FnBeforeHook<F> {
    name: String,
    func: F,
}

impl<F> FnBeforeHook<F>
where
    F: Fn(&RunContext) -> anyhow::Result<()> + Send + Sync,
{
    /// Creates a new closure-backed before-hook.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnBeforeHook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBeforeHook").field("name", &self.name).finish()
    }
}

impl<F> BeforeHook for FnBeforeHook<F>
where
    F: Fn(&RunContext) -> anyhow::Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn before(&self, ctx: &RunContext) -> anyhow::Result<()> {
        (self.func)(ctx)
    }
}

/// A closure-backed after-hook. Paths without a closure are no-ops.
#[derive(Default)]
pub struct FnAfterHook {
    name: String,
    success: Option<OutcomeFn>,
    failure: Option<FailureFn>,
    interrupted: Option<OutcomeFn>,
}

impl FnAfterHook {
    /// Creates an after-hook with no-op paths.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the success path.
    #[must_use]
    pub fn on_success<F>(mut self, func: F) -> Self
    where
        F: Fn(&RunContext, &MetricsCollector) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.success = Some(Arc::new(func));
        self
    }

    /// Sets the failure path.
    #[must_use]
    pub fn on_failure<F>(mut self, func: F) -> Self
    where
        F: Fn(&RunContext, &MetricsCollector, &PipelineError) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.failure = Some(Arc::new(func));
        self
    }

    /// Sets the interrupted path.
    #[must_use]
    pub fn on_interrupted<F>(mut self, func: F) -> Self
    where
        F: Fn(&RunContext, &MetricsCollector) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.interrupted = Some(Arc::new(func));
        self
    }
}

impl fmt::Debug for FnAfterHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAfterHook").field("name", &self.name).finish()
    }
}

impl AfterHook for FnAfterHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_success(&self, ctx: &RunContext, metrics: &MetricsCollector) -> anyhow::Result<()> {
        self.success.as_ref().map_or(Ok(()), |f| f(ctx, metrics))
    }

    fn on_failure(
        &self,
        ctx: &RunContext,
        metrics: &MetricsCollector,
        error: &PipelineError,
    ) -> anyhow::Result<()> {
        self.failure.as_ref().map_or(Ok(()), |f| f(ctx, metrics, error))
    }

    fn on_interrupted(&self, ctx: &RunContext, metrics: &MetricsCollector) -> anyhow::Result<()> {
        self.interrupted.as_ref().map_or(Ok(()), |f| f(ctx, metrics))
    }
}

/// Logs the outcome of a run with its counters and elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHook;

impl AfterHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_success(&self, ctx: &RunContext, _metrics: &MetricsCollector) -> anyhow::Result<()> {
        info!(
            pipeline = ctx.pipeline(),
            run_id = %ctx.run_id(),
            batches = ctx.batch_count(),
            records = ctx.record_count(),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "Pipeline completed"
        );
        Ok(())
    }

    fn on_failure(
        &self,
        ctx: &RunContext,
        _metrics: &MetricsCollector,
        err: &PipelineError,
    ) -> anyhow::Result<()> {
        error!(
            pipeline = ctx.pipeline(),
            run_id = %ctx.run_id(),
            batches = ctx.batch_count(),
            records = ctx.record_count(),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            error = %err,
            "Pipeline failed"
        );
        Ok(())
    }

    fn on_interrupted(&self, ctx: &RunContext, _metrics: &MetricsCollector) -> anyhow::Result<()> {
        warn!(
            pipeline = ctx.pipeline(),
            run_id = %ctx.run_id(),
            batches = ctx.batch_count(),
            records = ctx.record_count(),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "Pipeline interrupted"
        );
        Ok(())
    }
}

/// Logs the metrics report whatever the outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsReportHook;

impl MetricsReportHook {
    fn log(ctx: &RunContext, metrics: &MetricsCollector) {
        info!(pipeline = ctx.pipeline(), run_id = %ctx.run_id(), "{}", metrics.report());
    }
}

impl AfterHook for MetricsReportHook {
    fn name(&self) -> &str {
        "metrics_report"
    }

    fn on_success(&self, ctx: &RunContext, metrics: &MetricsCollector) -> anyhow::Result<()> {
        Self::log(ctx, metrics);
        Ok(())
    }

    fn on_failure(
        &self,
        ctx: &RunContext,
        metrics: &MetricsCollector,
        _error: &PipelineError,
    ) -> anyhow::Result<()> {
        Self::log(ctx, metrics);
        Ok(())
    }

    fn on_interrupted(&self, ctx: &RunContext, metrics: &MetricsCollector) -> anyhow::Result<()> {
        Self::log(ctx, metrics);
        Ok(())
    }
}

/// Seeds properties into the context before the first batch.
#[derive(Debug, Clone, Default)]
pub struct ContextSeedHook {
    properties: Vec<(String, Value)>,
}

impl ContextSeedHook {
    /// Creates an empty seed hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property to seed. Later entries win over earlier ones.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }
}

impl BeforeHook for ContextSeedHook {
    fn name(&self) -> &str {
        "context_seed"
    }

    fn before(&self, ctx: &RunContext) -> anyhow::Result<()> {
        for (key, value) in &self.properties {
            ctx.set(key.clone(), value.clone());
        }
        Ok(())
    }
}
