//! Serializable pipeline configuration.

use crate::errors::{ConfigError, ErrorKind, PipelineError};
use crate::pipeline::Executor;
use crate::retry::{
    AdaptivePolicy, AdaptiveRetry, ExponentialBackoff, FixedDelay, JitterStrategy, NeverSkip,
    NoRetry, RetryStrategy, SkipAfterNAttempts, SkipStrategy,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration of a pipeline and the failure handling of its operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Worker threads of an owned async executor.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Blocking threads of an owned async executor.
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,
    /// Split pulled batches into chunks of this size.
    #[serde(default)]
    pub split_size: Option<usize>,
    /// Retry policy for decorated operators.
    #[serde(default)]
    pub retry: RetryPolicyConfig,
    /// Skip policy for decorated operators.
    #[serde(default)]
    pub skip: SkipPolicyConfig,
}

fn default_name() -> String {
    "pipeline".to_string()
}

fn default_worker_threads() -> usize {
    4
}

fn default_max_blocking_threads() -> usize {
    16
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            worker_threads: default_worker_threads(),
            max_blocking_threads: default_max_blocking_threads(),
            split_size: None,
            retry: RetryPolicyConfig::default(),
            skip: SkipPolicyConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a setting is invalid.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::new("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::new("name", "must not be empty"));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::new("worker_threads", "must be at least 1"));
        }
        if self.max_blocking_threads == 0 {
            return Err(ConfigError::new("max_blocking_threads", "must be at least 1"));
        }
        if self.split_size == Some(0) {
            return Err(ConfigError::new("split_size", "must be at least 1"));
        }
        self.retry.validate()?;
        self.skip.validate()
    }

    /// Sets the worker thread count.
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Sets the blocking thread count.
    #[must_use]
    pub fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = threads;
        self
    }

    /// Sets the split size.
    #[must_use]
    pub fn with_split_size(mut self, size: usize) -> Self {
        self.split_size = Some(size);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicyConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the skip policy.
    #[must_use]
    pub fn with_skip(mut self, skip: SkipPolicyConfig) -> Self {
        self.skip = skip;
        self
    }

    /// Creates an owned executor sized by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built.
    pub fn executor(&self) -> Result<Executor, PipelineError> {
        Executor::new(self.worker_threads, self.max_blocking_threads)
    }
}

/// Retry policy, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetryPolicyConfig {
    /// Never retry.
    #[default]
    None,
    /// Constant delay.
    Fixed {
        /// Maximum attempts, including the first.
        max_attempts: u32,
        /// Delay between attempts.
        delay_ms: u64,
        /// Kinds to retry; empty means all.
        #[serde(default)]
        retryable: Vec<ErrorKind>,
    },
    /// Geometrically growing, capped delay.
    Exponential {
        /// Maximum attempts, including the first.
        max_attempts: u32,
        /// Delay after the first attempt.
        initial_delay_ms: u64,
        /// Upper bound of the delay.
        max_delay_ms: u64,
        /// Growth factor per attempt.
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        /// Jitter applied after the cap.
        #[serde(default)]
        jitter: JitterStrategy,
        /// Kinds to retry; empty means all.
        #[serde(default)]
        retryable: Vec<ErrorKind>,
    },
    /// Attempt limit and delay chosen by error kind.
    Adaptive {
        /// Policy for kinds without a rule.
        #[serde(default)]
        default: AdaptiveRuleConfig,
        /// Per-kind rules.
        #[serde(default)]
        rules: Vec<AdaptiveKindRule>,
    },
}

fn default_multiplier() -> f64 {
    2.0
}

/// Attempt limit and delay of an adaptive rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveRuleConfig {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay_ms: u64,
}

impl Default for AdaptiveRuleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl From<AdaptiveRuleConfig> for AdaptivePolicy {
    fn from(rule: AdaptiveRuleConfig) -> Self {
        Self::new(rule.max_attempts, Duration::from_millis(rule.delay_ms))
    }
}

/// An adaptive rule for one error kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveKindRule {
    /// The kind this rule applies to.
    pub kind: ErrorKind,
    /// The rule.
    #[serde(flatten)]
    pub rule: AdaptiveRuleConfig,
}

impl RetryPolicyConfig {
    /// Checks the policy parameters.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::None => Ok(()),
            Self::Fixed { max_attempts, .. } => check_attempts("retry.max_attempts", *max_attempts),
            Self::Exponential {
                max_attempts,
                initial_delay_ms,
                max_delay_ms,
                multiplier,
                ..
            } => {
                check_attempts("retry.max_attempts", *max_attempts)?;
                if !multiplier.is_finite() || *multiplier < 1.0 {
                    return Err(ConfigError::new(
                        "retry.multiplier",
                        format!("must be a finite number >= 1.0, got {multiplier}"),
                    ));
                }
                if initial_delay_ms > max_delay_ms {
                    return Err(ConfigError::new(
                        "retry.initial_delay_ms",
                        "must not exceed max_delay_ms",
                    ));
                }
                Ok(())
            }
            Self::Adaptive { default, rules } => {
                check_attempts("retry.default.max_attempts", default.max_attempts)?;
                rules
                    .iter()
                    .try_for_each(|r| check_attempts("retry.rules.max_attempts", r.rule.max_attempts))
            }
        }
    }

    /// Builds the configured strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy is invalid.
    pub fn build(&self) -> Result<Arc<dyn RetryStrategy>, ConfigError> {
        self.validate()?;
        let strategy: Arc<dyn RetryStrategy> = match self {
            Self::None => Arc::new(NoRetry),
            Self::Fixed {
                max_attempts,
                delay_ms,
                retryable,
            } => Arc::new(
                FixedDelay::new(*max_attempts, Duration::from_millis(*delay_ms))
                    .with_retryable_kinds(retryable.clone()),
            ),
            Self::Exponential {
                max_attempts,
                initial_delay_ms,
                max_delay_ms,
                multiplier,
                jitter,
                retryable,
            } => Arc::new(
                ExponentialBackoff::new(
                    *max_attempts,
                    Duration::from_millis(*initial_delay_ms),
                    Duration::from_millis(*max_delay_ms),
                    *multiplier,
                )
                .with_jitter(*jitter)
                .with_retryable_kinds(retryable.clone()),
            ),
            Self::Adaptive { default, rules } => Arc::new(rules.iter().fold(
                AdaptiveRetry::new((*default).into()),
                |strategy, r| strategy.with_policy(r.kind.clone(), r.rule.into()),
            )),
        };
        Ok(strategy)
    }
}

/// Skip policy, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkipPolicyConfig {
    /// Never skip.
    #[default]
    Never,
    /// Skip once `max_attempts` attempts have failed.
    AfterAttempts {
        /// Attempt at which skipping starts.
        max_attempts: u32,
        /// Kinds to skip; empty means all.
        #[serde(default)]
        skippable: Vec<ErrorKind>,
    },
}

impl SkipPolicyConfig {
    /// Checks the policy parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_attempts` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Never => Ok(()),
            Self::AfterAttempts { max_attempts, .. } => {
                check_attempts("skip.max_attempts", *max_attempts)
            }
        }
    }

    /// Builds the configured strategy.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy is invalid.
    pub fn build<T: 'static>(&self) -> Result<Arc<dyn SkipStrategy<T>>, ConfigError> {
        self.validate()?;
        let strategy: Arc<dyn SkipStrategy<T>> = match self {
            Self::Never => Arc::new(NeverSkip),
            Self::AfterAttempts {
                max_attempts,
                skippable,
            } => Arc::new(
                SkipAfterNAttempts::new(*max_attempts).with_skippable_kinds(skippable.clone()),
            ),
        };
        Ok(strategy)
    }
}

fn check_attempts(field: &str, attempts: u32) -> Result<(), ConfigError> {
    if attempts == 0 {
        return Err(ConfigError::new(field, "must be at least 1"));
    }
    Ok(())
}
