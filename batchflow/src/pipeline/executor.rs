//! The runtime that async pipelines dispatch stage calls onto.

use crate::errors::PipelineError;
use std::fmt;
use tokio::runtime::{Builder, Handle, Runtime};

/// Where an [`AsyncPipeline`](super::AsyncPipeline) runs its stages.
///
/// Either owns a multi-thread tokio runtime, shut down in the background
/// when the executor is dropped, or borrows a handle to a runtime owned
/// elsewhere.
pub struct Executor {
    runtime: Option<Runtime>,
    handle: Handle,
}

impl Executor {
    /// Creates an owned runtime with bounded worker and blocking pools.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Executor`] if the runtime cannot be built.
    pub fn new(worker_threads: usize, max_blocking_threads: usize) -> Result<Self, PipelineError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .max_blocking_threads(max_blocking_threads.max(1))
            .thread_name("batchflow-worker")
            .enable_all()
            .build()
            .map_err(|e| PipelineError::Executor(format!("failed to build runtime: {e}")))?;

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Borrows a runtime owned elsewhere.
    #[must_use]
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            runtime: None,
            handle,
        }
    }

    /// Borrows the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Executor`] outside a tokio runtime.
    pub fn current() -> Result<Self, PipelineError> {
        Handle::try_current()
            .map(Self::from_handle)
            .map_err(|e| PipelineError::Executor(e.to_string()))
    }

    /// Returns the runtime handle.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Returns true if this executor owns its runtime.
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.runtime.is_some()
    }

    /// Runs a blocking closure on the runtime's blocking pool.
    pub(crate) async fn dispatch<R, F>(&self, f: F) -> Result<R, PipelineError>
    where
        F: FnOnce() -> Result<R, PipelineError> + Send + 'static,
        R: Send + 'static,
    {
        self.handle
            .spawn_blocking(f)
            .await
            .map_err(|e| PipelineError::Executor(format!("stage task failed: {e}")))?
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("owned", &self.is_owned())
            .finish_non_exhaustive()
    }
}
