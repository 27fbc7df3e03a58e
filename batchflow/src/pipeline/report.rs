//! Summary of a finished run.

use super::PipelineState;
use crate::context::RunContext;
use crate::metrics::{MetricsCollector, OperatorMetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// How a run that returned `Ok` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The source was exhausted and every batch was processed.
    Completed,
    /// A graceful shutdown stopped the run between batches.
    Interrupted,
}

/// Counters and metrics of a run, captured when it ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The run identifier.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// The terminal state.
    pub state: PipelineState,
    /// Batches pulled from the source.
    pub batches: u64,
    /// Records pulled from the source.
    pub records: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
    /// Per-operator metrics, sorted by operator name.
    pub metrics: Vec<OperatorMetricsSnapshot>,
}

impl RunReport {
    pub(crate) fn capture(
        ctx: &RunContext,
        metrics: &MetricsCollector,
        outcome: RunOutcome,
        state: PipelineState,
    ) -> Self {
        Self {
            run_id: ctx.run_id(),
            pipeline: ctx.pipeline().to_string(),
            outcome,
            state,
            batches: ctx.batch_count(),
            records: ctx.record_count(),
            elapsed: ctx.elapsed(),
            metrics: metrics.get_all_metrics(),
        }
    }

    /// Returns true if the source was exhausted.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Returns the metrics of one operator.
    #[must_use]
    pub fn operator(&self, name: &str) -> Option<&OperatorMetricsSnapshot> {
        self.metrics.iter().find(|m| m.name == name)
    }
}
