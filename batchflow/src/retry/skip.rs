//! Skip strategies: turn an unrecoverable failure into a default value.

use crate::errors::{ErrorKind, OperatorError};
use std::fmt;
use std::sync::Arc;

/// Called with the input batch and the error whenever a batch is skipped.
pub type SkipListener<T> = Arc<dyn Fn(&[T], &OperatorError) + Send + Sync>;

/// Decides whether a failure that will not be retried is skipped.
pub trait SkipStrategy<T>: Send + Sync {
    /// Returns true if the batch that failed on `attempt` should be skipped.
    fn should_skip(&self, attempt: u32, input: &[T], error: &OperatorError) -> bool;

    /// Returns the attempt count at which skipping starts.
    fn max_attempts(&self) -> u32;
}

impl<T, S: SkipStrategy<T> + ?Sized> SkipStrategy<T> for Arc<S> {
    fn should_skip(&self, attempt: u32, input: &[T], error: &OperatorError) -> bool {
        (**self).should_skip(attempt, input, error)
    }

    fn max_attempts(&self) -> u32 {
        (**self).max_attempts()
    }
}

/// Never skips.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSkip;

impl<T> SkipStrategy<T> for NeverSkip {
    fn should_skip(&self, _attempt: u32, _input: &[T], _error: &OperatorError) -> bool {
        false
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}

/// Skips once `max_attempts` attempts have failed.
///
/// The listener, if any, is invoked exactly once for every accepted skip.
///
/// Attempts only continue while the retry strategy allows them, so a
/// threshold above 1 needs a retry strategy permitting at least that many
/// attempts. Under [`NoRetry`](super::NoRetry) the call gives up after the
/// first failure.
pub struct SkipAfterNAttempts<T> {
    max_attempts: u32,
    skippable: Vec<ErrorKind>,
    listener: Option<SkipListener<T>>,
}

impl<T> SkipAfterNAttempts<T> {
    /// Creates a strategy that skips every error kind.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            skippable: Vec::new(),
            listener: None,
        }
    }

    /// Restricts skipping to the given kinds.
    #[must_use]
    pub fn with_skippable_kinds(mut self, kinds: Vec<ErrorKind>) -> Self {
        self.skippable = kinds;
        self
    }

    /// Sets the skip listener.
    #[must_use]
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&[T], &OperatorError) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }
}

impl<T> fmt::Debug for SkipAfterNAttempts<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkipAfterNAttempts")
            .field("max_attempts", &self.max_attempts)
            .field("skippable", &self.skippable)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl<T> SkipStrategy<T> for SkipAfterNAttempts<T> {
    fn should_skip(&self, attempt: u32, input: &[T], error: &OperatorError) -> bool {
        if attempt < self.max_attempts || !error.kind().matches_any(&self.skippable) {
            return false;
        }
        if let Some(listener) = &self.listener {
            listener(input, error);
        }
        true
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
