//! Error types for the batchflow engine.
//!
//! Operators fail with [`OperatorError`], classified by an [`ErrorKind`] that
//! retry and skip strategies match against. Anything that escapes an
//! operator (or its retry decorator) reaches the orchestrator and surfaces to
//! the caller as a [`PipelineError`].

use crate::pipeline::PipelineState;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed error used as the underlying cause of an operator failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classification of an operator failure.
///
/// Strategies are configured with lists of kinds they apply to; an empty list
/// means "every kind".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A failure expected to go away on its own.
    Transient,
    /// The operation did not complete in time.
    Timeout,
    /// A remote endpoint could not be reached.
    Connection,
    /// Local I/O failed.
    Io,
    /// A remote endpoint rejected the call because of rate limits.
    RateLimited,
    /// The batch contents could not be processed.
    InvalidData,
    /// A failure that no retry can fix.
    Fatal,
    /// A connector-specific classification.
    Custom(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Timeout => write!(f, "timeout"),
            Self::Connection => write!(f, "connection"),
            Self::Io => write!(f, "io"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::InvalidData => write!(f, "invalid_data"),
            Self::Fatal => write!(f, "fatal"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl ErrorKind {
    /// Returns true if `kinds` is empty or contains this kind.
    #[must_use]
    pub fn matches_any(&self, kinds: &[ErrorKind]) -> bool {
        kinds.is_empty() || kinds.contains(self)
    }
}

/// The error a Source, Transform or Sink raises on a single call.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// A single failed call.
    #[error("{kind} error: {message}")]
    Failed {
        /// Classification used by retry and skip strategies.
        kind: ErrorKind,
        /// Human-readable description.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// Retries were exhausted and no skip strategy accepted the failure.
    #[error("gave up after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// The error of the last attempt.
        #[source]
        source: Box<OperatorError>,
    },
}

impl OperatorError {
    /// Creates a failure of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transient failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Creates a fatal failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    /// Creates a timeout failure.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Creates an invalid-data failure.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidData, message)
    }

    /// Attaches an underlying cause.
    #[must_use]
    pub fn with_source(self, cause: impl Into<BoxError>) -> Self {
        match self {
            Self::Failed { kind, message, .. } => Self::Failed {
                kind,
                message,
                source: Some(cause.into()),
            },
            other => other,
        }
    }

    /// Wraps an error with the number of attempts that were made.
    #[must_use]
    pub fn exhausted(self, attempts: u32) -> Self {
        Self::RetriesExhausted {
            attempts,
            source: Box::new(self),
        }
    }

    /// Returns the classification of this error.
    ///
    /// Exhausted-retry errors report the kind of the last attempt.
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        match self {
            Self::Failed { kind, .. } => kind,
            Self::RetriesExhausted { source, .. } => source.kind(),
        }
    }

    /// Returns the attempt count for exhausted-retry errors.
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Failed { .. } => None,
            Self::RetriesExhausted { attempts, .. } => Some(*attempts),
        }
    }
}

impl From<std::io::Error> for OperatorError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::NotConnected => ErrorKind::Connection,
            std::io::ErrorKind::InvalidData => ErrorKind::InvalidData,
            _ => ErrorKind::Io,
        };
        Self::new(kind, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::InvalidData, err.to_string()).with_source(err)
    }
}

/// Error raised when a pipeline, strategy or splitter is misconfigured.
#[derive(Debug, Clone, Error)]
#[error("Invalid configuration for '{field}': {message}")]
pub struct ConfigError {
    /// The offending setting.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced to the caller of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline was run twice, or driven from a state that forbids it.
    #[error("Invalid pipeline state: expected {expected}, found {found}")]
    InvalidState {
        /// The state the operation requires.
        expected: PipelineState,
        /// The state the pipeline was in.
        found: PipelineState,
    },

    /// A before-hook failed and the run was aborted before any operator ran.
    #[error("Before hook '{hook}' failed: {source}")]
    Hook {
        /// The hook name.
        hook: String,
        /// The hook's error.
        #[source]
        source: anyhow::Error,
    },

    /// An operator failed and nothing recovered the failure.
    #[error("Operator '{operator}' failed: {source}")]
    Operator {
        /// The operator name.
        operator: String,
        /// The operator's error.
        #[source]
        source: OperatorError,
    },

    /// In-flight work was cancelled by `shutdown_now`.
    #[error("Pipeline interrupted: {0}")]
    Interrupted(String),

    /// A task dispatched to the executor panicked or was cancelled.
    #[error("Executor error: {0}")]
    Executor(String),

    /// The pipeline could not be assembled.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Creates an operator error.
    #[must_use]
    pub fn operator(operator: impl Into<String>, source: OperatorError) -> Self {
        Self::Operator {
            operator: operator.into(),
            source,
        }
    }

    /// Returns the name of the failing operator, if the error came from one.
    #[must_use]
    pub fn operator_name(&self) -> Option<&str> {
        match self {
            Self::Operator { operator, .. } => Some(operator),
            _ => None,
        }
    }

    /// Returns true for invalid-state errors.
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}
