//! Pipeline assembly and execution.
//!
//! This module provides:
//! - [`PipelineBuilder`], a typed builder checking the operator chain at
//!   compile time
//! - [`Pipeline`], the single-threaded orchestrator
//! - [`AsyncPipeline`] and its [`Executor`]
//! - The lifecycle [`PipelineState`] and the [`RunReport`] of a run

mod async_pipeline;
mod builder;
mod engine;
mod executor;
mod report;
mod shutdown;
mod state;
mod sync_pipeline;

#[cfg(test)]
mod integration_tests;

pub use async_pipeline::AsyncPipeline;
pub use builder::PipelineBuilder;
pub use executor::Executor;
pub use report::{RunOutcome, RunReport};
pub use state::PipelineState;
pub use sync_pipeline::Pipeline;

use crate::context::RunContext;
use crate::metrics::MetricsCollector;

/// Direct access to a pipeline's metrics and run context.
///
/// Implemented by both orchestrators so hooks and callers can inspect either
/// the same way.
pub trait Instrumented {
    /// Returns the pipeline's metrics collector.
    fn metrics(&self) -> &MetricsCollector;

    /// Returns the pipeline's run context.
    fn context(&self) -> &RunContext;
}
