//! # Batchflow
//!
//! A batch-processing pipeline engine.
//!
//! A pipeline pulls batches from one source and threads each batch through
//! an ordered chain of transforms and sinks, with:
//!
//! - **Typed chains**: each transform changes the item type seen downstream
//! - **Retry and skip**: per-operator strategies resolved inside decorators
//! - **Splitting**: oversized or mixed batches are processed as sub-batches
//! - **Per-operator metrics**: call counts and durations for every operator
//! - **Lifecycle hooks**: before-run hooks that can abort, after-run hooks per outcome
//! - **Graceful and immediate shutdown** from any thread
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use batchflow::prelude::*;
//!
//! let pipeline = Pipeline::builder(reader)
//!     .name("orders")
//!     .transform(RetryableTransform::new(enrich).with_retry(FixedDelay::new(3, delay)))
//!     .sink(writer)
//!     .build();
//!
//! let report = pipeline.run()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod errors;
pub mod hooks;
pub mod metrics;
pub mod observability;
pub mod operators;
pub mod pipeline;
pub mod retry;
pub mod splitter;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{PipelineConfig, RetryPolicyConfig, SkipPolicyConfig};
    pub use crate::context::RunContext;
    pub use crate::errors::{ConfigError, ErrorKind, OperatorError, PipelineError};
    pub use crate::hooks::{AfterHook, BeforeHook, FnAfterHook, FnBeforeHook};
    pub use crate::metrics::{MetricsCollector, OperatorMetricsSnapshot};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::operators::{Batch, FnSink, FnSource, FnTransform, Sink, Source, Transform};
    pub use crate::pipeline::{
        AsyncPipeline, Executor, Instrumented, Pipeline, PipelineBuilder, PipelineState,
        RunOutcome, RunReport,
    };
    pub use crate::retry::{
        ExponentialBackoff, FixedDelay, NoRetry, RetryStrategy, RetryableSink,
        RetryableTransform, SkipAfterNAttempts, SkipStrategy,
    };
    pub use crate::splitter::{BatchSplitter, FixedSizeSplitter, PredicatePartition};
}
