//! Retry/skip decorators for transforms and sinks.

use super::skip::{NeverSkip, SkipStrategy};
use super::strategy::{NoRetry, RetryStrategy};
use crate::context::RunContext;
use crate::errors::OperatorError;
use crate::operators::{Batch, Sink, Transform};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

type Fallback<T, R> = Arc<dyn Fn(&[T]) -> R + Send + Sync>;

/// The attempt loop shared by [`RetryableTransform`] and [`RetryableSink`].
///
/// Every call ends in exactly one of: a successful result, the fallback
/// value of an accepted skip, or [`OperatorError::RetriesExhausted`].
pub struct RetryExecutor<T, R> {
    retry: Arc<dyn RetryStrategy>,
    skip: Arc<dyn SkipStrategy<T>>,
    fallback: Fallback<T, R>,
}

impl<T: 'static, R: 'static> RetryExecutor<T, R> {
    /// Creates an executor that never retries or skips.
    ///
    /// `fallback` produces the value returned when a skip is accepted.
    pub fn new<F>(fallback: F) -> Self
    where
        F: Fn(&[T]) -> R + Send + Sync + 'static,
    {
        Self {
            retry: Arc::new(NoRetry),
            skip: Arc::new(NeverSkip),
            fallback: Arc::new(fallback),
        }
    }

    /// Sets the retry strategy.
    #[must_use]
    pub fn with_retry(mut self, retry: impl RetryStrategy + 'static) -> Self {
        self.retry = Arc::new(retry);
        self
    }

    /// Sets the skip strategy.
    #[must_use]
    pub fn with_skip(mut self, skip: impl SkipStrategy<T> + 'static) -> Self {
        self.skip = Arc::new(skip);
        self
    }

    /// Sets the value returned for a skipped batch.
    #[must_use]
    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&[T]) -> R + Send + Sync + 'static,
    {
        self.fallback = Arc::new(fallback);
        self
    }
}

impl<T, R> RetryExecutor<T, R> {
    /// Returns the retry strategy.
    #[must_use]
    pub fn retry(&self) -> &dyn RetryStrategy {
        self.retry.as_ref()
    }

    /// Runs `call` until it succeeds, is skipped, or gives up.
    ///
    /// `input` is the batch handed to the skip strategy and the fallback.
    /// Waits between attempts block the current thread.
    pub fn execute<F>(&self, operator: &str, input: &[T], mut call: F) -> Result<R, OperatorError>
    where
        F: FnMut() -> Result<R, OperatorError>,
    {
        let mut attempt: u32 = 1;
        loop {
            let err = match call() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operator, attempt, "Operator succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if self.retry.should_retry(attempt, &err) {
                let delay = self.retry.wait_time(attempt, &err);
                warn!(
                    operator,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operator failed, retrying"
                );
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt = attempt.saturating_add(1);
                continue;
            }

            if self.skip.should_skip(attempt, input, &err) {
                warn!(
                    operator,
                    attempt,
                    records = input.len(),
                    error = %err,
                    "Skipping batch"
                );
                return Ok((self.fallback)(input));
            }

            error!(operator, attempt, error = %err, "Giving up on operator");
            return Err(err.exhausted(attempt));
        }
    }
}

impl<T, R> fmt::Debug for RetryExecutor<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("max_attempts", &self.retry.max_attempts())
            .field("skip_after", &self.skip.max_attempts())
            .finish_non_exhaustive()
    }
}

/// Decorates a [`Transform`] with retry and skip handling.
///
/// The input batch is cloned for every attempt, so the inner transform
/// always sees the original batch. A skipped batch yields the fallback
/// value, an empty batch unless configured otherwise.
pub struct RetryableTransform<I, O, P> {
    inner: P,
    name: Option<String>,
    executor: RetryExecutor<I, Batch<O>>,
}

impl<I, O, P> RetryableTransform<I, O, P>
where
    I: 'static,
    O: 'static,
    P: Transform<I, O>,
{
    /// Wraps a transform with no retry and no skip.
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            name: None,
            executor: RetryExecutor::new(|_| Vec::new()),
        }
    }

    /// Sets the retry strategy.
    #[must_use]
    pub fn with_retry(mut self, retry: impl RetryStrategy + 'static) -> Self {
        self.executor = self.executor.with_retry(retry);
        self
    }

    /// Sets the skip strategy.
    #[must_use]
    pub fn with_skip(mut self, skip: impl SkipStrategy<I> + 'static) -> Self {
        self.executor = self.executor.with_skip(skip);
        self
    }

    /// Computes the output of a skipped batch from its input.
    #[must_use]
    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&[I]) -> Batch<O> + Send + Sync + 'static,
    {
        self.executor = self.executor.with_fallback(fallback);
        self
    }

    /// Returns `value` for every skipped batch.
    #[must_use]
    pub fn with_default(self, value: Batch<O>) -> Self
    where
        O: Clone + Send + Sync,
    {
        self.with_fallback(move |_| value.clone())
    }

    /// Overrides the name reported to metrics and logs.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the wrapped transform.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<I, O, P> Transform<I, O> for RetryableTransform<I, O, P>
where
    I: Clone,
    P: Transform<I, O>,
{
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.inner.name())
    }

    fn process(&self, batch: Batch<I>, ctx: &RunContext) -> Result<Batch<O>, OperatorError> {
        self.executor
            .execute(self.name(), &batch, || self.inner.process(batch.clone(), ctx))
    }
}

impl<I, O, P> fmt::Debug for RetryableTransform<I, O, P>
where
    P: Transform<I, O>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryableTransform")
            .field("name", &self.name.as_deref().unwrap_or_else(|| self.inner.name()))
            .field("executor", &self.executor)
            .finish()
    }
}

/// Decorates a [`Sink`] with retry and skip handling.
///
/// A skipped batch counts as written.
pub struct RetryableSink<T, S> {
    inner: S,
    name: Option<String>,
    executor: RetryExecutor<T, ()>,
}

impl<T, S> RetryableSink<T, S>
where
    T: 'static,
    S: Sink<T>,
{
    /// Wraps a sink with no retry and no skip.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            name: None,
            executor: RetryExecutor::new(|_| ()),
        }
    }

    /// Sets the retry strategy.
    #[must_use]
    pub fn with_retry(mut self, retry: impl RetryStrategy + 'static) -> Self {
        self.executor = self.executor.with_retry(retry);
        self
    }

    /// Sets the skip strategy.
    #[must_use]
    pub fn with_skip(mut self, skip: impl SkipStrategy<T> + 'static) -> Self {
        self.executor = self.executor.with_skip(skip);
        self
    }

    /// Overrides the name reported to metrics and logs.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns the wrapped sink.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<T, S> Sink<T> for RetryableSink<T, S>
where
    S: Sink<T>,
{
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.inner.name())
    }

    fn write(&self, batch: &[T], ctx: &RunContext) -> Result<(), OperatorError> {
        self.executor
            .execute(self.name(), batch, || self.inner.write(batch, ctx))
    }
}

impl<T, S> fmt::Debug for RetryableSink<T, S>
where
    S: Sink<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryableSink")
            .field("name", &self.name.as_deref().unwrap_or_else(|| self.inner.name()))
            .field("executor", &self.executor)
            .finish()
    }
}
