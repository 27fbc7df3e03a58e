//! Pipeline lifecycle state machine.

use crate::errors::PipelineError;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

/// Lifecycle state of a pipeline.
///
/// `Init -> Running -> Stopped` on success, `Running -> Failed` on an
/// unrecovered error, `Running -> Stopping -> Stopped` on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Built, not yet run.
    Init,
    /// Processing batches.
    Running,
    /// Shutdown requested; finishing in-flight work.
    Stopping,
    /// Finished, either exhausted or shut down.
    Stopped,
    /// Aborted by an error.
    Failed,
}

impl PipelineState {
    /// Returns true for `Stopped` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Shared state cell observable from blocking and async waiters.
pub(crate) struct StateMachine {
    state: Mutex<PipelineState>,
    changed: Condvar,
    watch: watch::Sender<PipelineState>,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        let (watch, _) = watch::channel(PipelineState::Init);
        Self {
            state: Mutex::new(PipelineState::Init),
            changed: Condvar::new(),
            watch,
        }
    }

    pub(crate) fn current(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Moves `Init -> Running`. A pipeline runs at most once.
    pub(crate) fn begin(&self) -> Result<(), PipelineError> {
        let mut state = self.state.lock();
        if *state != PipelineState::Init {
            return Err(PipelineError::InvalidState {
                expected: PipelineState::Init,
                found: *state,
            });
        }
        self.set(&mut state, PipelineState::Running);
        Ok(())
    }

    /// Moves `Running -> Stopping`; returns false from any other state.
    pub(crate) fn request_stop(&self) -> bool {
        let mut state = self.state.lock();
        if *state != PipelineState::Running {
            return false;
        }
        self.set(&mut state, PipelineState::Stopping);
        true
    }

    /// Enters a terminal state and wakes every waiter.
    pub(crate) fn finish(&self, terminal: PipelineState) {
        debug_assert!(terminal.is_terminal());
        let mut state = self.state.lock();
        self.set(&mut state, terminal);
    }

    fn set(&self, state: &mut PipelineState, next: PipelineState) {
        *state = next;
        self.watch.send_replace(next);
        self.changed.notify_all();
    }

    /// Blocks until a terminal state or the timeout.
    pub(crate) fn wait_terminal(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        self.changed
            .wait_while_for(&mut state, |s| !s.is_terminal(), timeout);
        state.is_terminal()
    }

    /// Waits until a terminal state or the timeout without blocking a thread.
    pub(crate) async fn wait_terminal_async(&self, timeout: Duration) -> bool {
        let mut rx = self.watch.subscribe();
        let reached = tokio::time::timeout(timeout, rx.wait_for(|s| s.is_terminal()))
            .await
            .is_ok_and(|r| r.is_ok());
        reached
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("state", &self.current())
            .finish()
    }
}
