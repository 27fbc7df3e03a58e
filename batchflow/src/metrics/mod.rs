//! Per-operator call metrics.
//!
//! One [`MetricsCollector`] exists per pipeline. Orchestrators record the
//! outcome and duration of every source pull and operator call; the
//! collector can be read concurrently while a run is in progress.

mod collector;
mod timer;

pub use collector::{MetricsCollector, OperatorMetrics, OperatorMetricsSnapshot};
pub use timer::OperationTimer;
