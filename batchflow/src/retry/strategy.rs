//! Retry strategies with fixed, exponential and per-error-kind delays.

use crate::errors::{ErrorKind, OperatorError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a failed call is retried, and how long to wait first.
///
/// Attempt counts are 1-based: the first call is attempt 1.
#[cfg_attr(test, mockall::automock)]
pub trait RetryStrategy: Send + Sync {
    /// Returns true if the call that failed on `attempt` should be retried.
    fn should_retry(&self, attempt: u32, error: &OperatorError) -> bool;

    /// Returns the wait before the attempt following `attempt`.
    fn wait_time(&self, attempt: u32, error: &OperatorError) -> Duration;

    /// Returns the maximum number of attempts, including the first.
    fn max_attempts(&self) -> u32;
}

impl<R: RetryStrategy + ?Sized> RetryStrategy for Arc<R> {
    fn should_retry(&self, attempt: u32, error: &OperatorError) -> bool {
        (**self).should_retry(attempt, error)
    }

    fn wait_time(&self, attempt: u32, error: &OperatorError) -> Duration {
        (**self).wait_time(attempt, error)
    }

    fn max_attempts(&self) -> u32 {
        (**self).max_attempts()
    }
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn should_retry(&self, _attempt: u32, _error: &OperatorError) -> bool {
        false
    }

    fn wait_time(&self, _attempt: u32, _error: &OperatorError) -> Duration {
        Duration::ZERO
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}

/// Retries with a constant delay.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    max_attempts: u32,
    delay: Duration,
    retryable: Vec<ErrorKind>,
}

impl FixedDelay {
    /// Creates a fixed-delay strategy retrying every error kind.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            retryable: Vec::new(),
        }
    }

    /// Restricts retries to the given kinds.
    #[must_use]
    pub fn with_retryable_kinds(mut self, kinds: Vec<ErrorKind>) -> Self {
        self.retryable = kinds;
        self
    }

    /// Returns the constant delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl RetryStrategy for FixedDelay {
    fn should_retry(&self, attempt: u32, error: &OperatorError) -> bool {
        attempt < self.max_attempts && error.kind().matches_any(&self.retryable)
    }

    fn wait_time(&self, _attempt: u32, _error: &OperatorError) -> Duration {
        self.delay
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Jitter applied on top of a computed backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter.
    #[default]
    None,
    /// Full jitter: [0, delay].
    Full,
    /// Equal jitter: [delay/2, delay].
    Equal,
}

impl JitterStrategy {
    /// Applies jitter to a delay.
    #[must_use]
    pub fn apply(&self, delay: Duration) -> Duration {
        let nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        if nanos == 0 {
            return delay;
        }

        let mut rng = rand::thread_rng();
        match self {
            Self::None => delay,
            Self::Full => Duration::from_nanos(rng.gen_range(0..=nanos)),
            Self::Equal => {
                let half = nanos / 2;
                Duration::from_nanos(half + rng.gen_range(0..=nanos - half))
            }
        }
    }
}

/// Retries with a geometrically growing, capped delay.
///
/// `wait(k) = min(initial_delay * multiplier^(k-1), max_delay)`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: JitterStrategy,
    retryable: Vec<ErrorKind>,
}

impl ExponentialBackoff {
    /// Creates an exponential backoff strategy retrying every error kind.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            multiplier,
            jitter: JitterStrategy::None,
            retryable: Vec::new(),
        }
    }

    /// Restricts retries to the given kinds.
    #[must_use]
    pub fn with_retryable_kinds(mut self, kinds: Vec<ErrorKind>) -> Self {
        self.retryable = kinds;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterStrategy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the capped delay before the attempt following `attempt`,
    /// without jitter.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_nanos() as f64 * self.multiplier.powi(exponent);
        let cap = self.max_delay.as_nanos() as f64;

        if scaled.is_finite() && scaled < cap {
            Duration::from_nanos(scaled.max(0.0) as u64)
        } else {
            self.max_delay
        }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn should_retry(&self, attempt: u32, error: &OperatorError) -> bool {
        attempt < self.max_attempts && error.kind().matches_any(&self.retryable)
    }

    fn wait_time(&self, attempt: u32, _error: &OperatorError) -> Duration {
        self.jitter.apply(self.delay(attempt))
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Attempt limit and delay used by [`AdaptiveRetry`] for one error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptivePolicy {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Constant delay between attempts.
    pub delay: Duration,
}

impl AdaptivePolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for AdaptivePolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Picks attempt limit and delay by the kind of the error.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveRetry {
    policies: HashMap<ErrorKind, AdaptivePolicy>,
    default: AdaptivePolicy,
}

impl AdaptiveRetry {
    /// Creates an adaptive strategy with the given fallback policy.
    #[must_use]
    pub fn new(default: AdaptivePolicy) -> Self {
        Self {
            policies: HashMap::new(),
            default,
        }
    }

    /// Sets the policy for one error kind.
    #[must_use]
    pub fn with_policy(mut self, kind: ErrorKind, policy: AdaptivePolicy) -> Self {
        self.policies.insert(kind, policy);
        self
    }

    /// Returns the policy that applies to `kind`.
    #[must_use]
    pub fn policy_for(&self, kind: &ErrorKind) -> AdaptivePolicy {
        self.policies.get(kind).copied().unwrap_or(self.default)
    }
}

impl RetryStrategy for AdaptiveRetry {
    fn should_retry(&self, attempt: u32, error: &OperatorError) -> bool {
        attempt < self.policy_for(error.kind()).max_attempts
    }

    fn wait_time(&self, _attempt: u32, error: &OperatorError) -> Duration {
        self.policy_for(error.kind()).delay
    }

    /// The largest limit across all kinds; per-call decisions use the entry
    /// for the error's kind.
    fn max_attempts(&self) -> u32 {
        self.policies
            .values()
            .map(|p| p.max_attempts)
            .fold(self.default.max_attempts, u32::max)
    }
}
