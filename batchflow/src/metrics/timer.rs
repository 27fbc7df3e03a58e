//! Timing helper for instrumented calls.

use std::time::{Duration, Instant};

/// Measures one operator call.
#[derive(Debug)]
pub struct OperationTimer {
    start: Instant,
    name: String,
}

impl OperationTimer {
    /// Starts a new timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Returns the name of the timed operation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the timer and returns the measured duration.
    #[must_use]
    pub fn finish(self) -> Duration {
        self.elapsed()
    }
}
