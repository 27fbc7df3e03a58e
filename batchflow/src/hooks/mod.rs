//! Lifecycle hooks run before and after a pipeline run.
//!
//! Before-hooks run in registration order ahead of the first batch pull; the
//! first failure aborts the run. After-hooks run in registration order
//! exactly once per run, on one of three paths: success, failure or
//! interrupted. After-hook errors are logged and never change the outcome.

mod builtin;

pub use builtin::{ContextSeedHook, FnAfterHook, FnBeforeHook, LoggingHook, MetricsReportHook};

use crate::context::RunContext;
use crate::errors::PipelineError;
use crate::metrics::MetricsCollector;
use std::sync::Arc;
use tracing::warn;

/// A hook run before the first batch is pulled.
pub trait BeforeHook: Send + Sync {
    /// Returns the hook name used in errors and logs.
    fn name(&self) -> &str;

    /// Prepares the run. An error aborts the run before any operator runs.
    fn before(&self, ctx: &RunContext) -> anyhow::Result<()>;
}

/// A hook run once the run's outcome is known.
///
/// Exactly one of the three methods is called per run.
pub trait AfterHook: Send + Sync {
    /// Returns the hook name used in logs.
    fn name(&self) -> &str;

    /// Called after the source is exhausted and every batch was processed.
    fn on_success(&self, _ctx: &RunContext, _metrics: &MetricsCollector) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after an operator or the executor failed the run.
    fn on_failure(
        &self,
        _ctx: &RunContext,
        _metrics: &MetricsCollector,
        _error: &PipelineError,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after the run was stopped by a shutdown request.
    fn on_interrupted(&self, _ctx: &RunContext, _metrics: &MetricsCollector) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<H: BeforeHook + ?Sized> BeforeHook for Arc<H> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn before(&self, ctx: &RunContext) -> anyhow::Result<()> {
        (**self).before(ctx)
    }
}

impl<H: AfterHook + ?Sized> AfterHook for Arc<H> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn on_success(&self, ctx: &RunContext, metrics: &MetricsCollector) -> anyhow::Result<()> {
        (**self).on_success(ctx, metrics)
    }

    fn on_failure(
        &self,
        ctx: &RunContext,
        metrics: &MetricsCollector,
        error: &PipelineError,
    ) -> anyhow::Result<()> {
        (**self).on_failure(ctx, metrics, error)
    }

    fn on_interrupted(&self, ctx: &RunContext, metrics: &MetricsCollector) -> anyhow::Result<()> {
        (**self).on_interrupted(ctx, metrics)
    }
}

/// Which after-hook path a finished run takes.
#[derive(Debug, Clone, Copy)]
pub(crate) enum HookPath<'a> {
    Success,
    Failure(&'a PipelineError),
    Interrupted,
}

/// Ordered before- and after-hooks of one pipeline.
#[derive(Default)]
pub(crate) struct HookChain {
    before: Vec<Arc<dyn BeforeHook>>,
    after: Vec<Arc<dyn AfterHook>>,
}

impl HookChain {
    pub(crate) fn add_before(&mut self, hook: Arc<dyn BeforeHook>) {
        self.before.push(hook);
    }

    pub(crate) fn add_after(&mut self, hook: Arc<dyn AfterHook>) {
        self.after.push(hook);
    }

    /// Runs before-hooks in order, stopping at the first failure.
    pub(crate) fn run_before(&self, ctx: &RunContext) -> Result<(), PipelineError> {
        for hook in &self.before {
            hook.before(ctx).map_err(|source| PipelineError::Hook {
                hook: hook.name().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Runs every after-hook on `path`, logging failures.
    pub(crate) fn run_after(&self, ctx: &RunContext, metrics: &MetricsCollector, path: HookPath<'_>) {
        for hook in &self.after {
            let result = match path {
                HookPath::Success => hook.on_success(ctx, metrics),
                HookPath::Failure(error) => hook.on_failure(ctx, metrics, error),
                HookPath::Interrupted => hook.on_interrupted(ctx, metrics),
            };
            if let Err(e) = result {
                warn!(
                    pipeline = ctx.pipeline(),
                    run_id = %ctx.run_id(),
                    hook = hook.name(),
                    error = %e,
                    "After hook failed"
                );
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.before.len() + self.after.len()
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("before", &self.before.iter().map(|h| h.name()).collect::<Vec<_>>())
            .field("after", &self.after.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OperatorError;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn recording_before(log: &Arc<Mutex<Vec<String>>>, name: &'static str, fail: bool) -> Arc<dyn BeforeHook> {
        let log = log.clone();
        Arc::new(FnBeforeHook::new(name, move |_ctx: &RunContext| {
            log.lock().push(name.to_string());
            if fail {
                anyhow::bail!("{name} refused");
            }
            Ok(())
        }))
    }

    #[test]
    fn test_before_hooks_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HookChain::default();
        chain.add_before(recording_before(&log, "first", false));
        chain.add_before(recording_before(&log, "second", false));

        chain.run_before(&RunContext::new("p")).unwrap();

        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_before_hook_failure_stops_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HookChain::default();
        chain.add_before(recording_before(&log, "first", true));
        chain.add_before(recording_before(&log, "second", false));

        let err = chain.run_before(&RunContext::new("p")).unwrap_err();

        assert_eq!(*log.lock(), vec!["first"]);
        assert!(matches!(&err, PipelineError::Hook { hook, .. } if hook == "first"));
        assert_eq!(err.to_string(), "Before hook 'first' failed: first refused");
    }

    #[test]
    fn test_after_hook_paths_and_error_isolation() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = HookChain::default();

        let failing_log = log.clone();
        chain.add_after(Arc::new(
            FnAfterHook::new("failing").on_failure(move |_ctx, _m, _e| {
                failing_log.lock().push("failing".to_string());
                anyhow::bail!("cannot notify")
            }),
        ));
        let next_log = log.clone();
        chain.add_after(Arc::new(
            FnAfterHook::new("next").on_failure(move |_ctx, _m, e| {
                next_log.lock().push(format!("next: {e}"));
                Ok(())
            }),
        ));

        let error = PipelineError::operator("writer", OperatorError::fatal("disk full"));
        chain.run_after(
            &RunContext::new("p"),
            &MetricsCollector::new(),
            HookPath::Failure(&error),
        );

        assert_eq!(
            *log.lock(),
            vec![
                "failing".to_string(),
                "next: Operator 'writer' failed: fatal error: disk full".to_string()
            ]
        );
        assert_eq!(chain.len(), 2);
    }
}
