//! Retry and skip handling for operators.
//!
//! Failure handling is resolved entirely inside the [`RetryableTransform`]
//! and [`RetryableSink`] decorators: the orchestrator never sees an error
//! that a strategy could still recover.

mod retryable;
mod skip;
mod strategy;

pub use retryable::{RetryExecutor, RetryableSink, RetryableTransform};
pub use skip::{NeverSkip, SkipAfterNAttempts, SkipListener, SkipStrategy};
pub use strategy::{
    AdaptivePolicy, AdaptiveRetry, ExponentialBackoff, FixedDelay, JitterStrategy, NoRetry,
    RetryStrategy,
};

#[cfg(test)]
pub(crate) use strategy::MockRetryStrategy;
