//! Operator contracts.
//!
//! Operators are the units of processing in a pipeline. A pipeline pulls
//! batches from one [`Source`] and threads them through an ordered chain of
//! [`Transform`]s and [`Sink`]s.

mod chain;

pub(crate) use chain::{Envelope, SinkStage, Stage, TransformStage};

use crate::context::RunContext;
use crate::errors::OperatorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One unit of data flowing between operators.
pub type Batch<T> = Vec<T>;

/// The capability an operator provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    /// Produces batches.
    Source,
    /// Maps a batch to a new batch.
    Transform,
    /// Consumes a batch.
    Sink,
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Transform => write!(f, "transform"),
            Self::Sink => write!(f, "sink"),
        }
    }
}

/// Produces batches until it signals end-of-stream.
pub trait Source<T>: Send + Sync {
    /// Returns the name used in metrics and logs.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Pulls the next batch.
    ///
    /// `Ok(None)` and `Ok(Some(empty))` both signal end-of-stream.
    fn next_batch(&self, ctx: &RunContext) -> Result<Option<Batch<T>>, OperatorError>;
}

/// Maps one batch to another, possibly of a different item type.
pub trait Transform<I, O>: Send + Sync {
    /// Returns the name used in metrics and logs.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Processes a batch. Callers must not assume idempotence.
    fn process(&self, batch: Batch<I>, ctx: &RunContext) -> Result<Batch<O>, OperatorError>;
}

/// Consumes a batch.
///
/// Sinks see the batch by reference so that several sinks can be chained;
/// the batch continues to the next operator unchanged.
pub trait Sink<T>: Send + Sync {
    /// Returns the name used in metrics and logs.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Writes a batch. May fail on partial or total write failure.
    fn write(&self, batch: &[T], ctx: &RunContext) -> Result<(), OperatorError>;
}

impl<T, S: Source<T> + ?Sized> Source<T> for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_batch(&self, ctx: &RunContext) -> Result<Option<Batch<T>>, OperatorError> {
        (**self).next_batch(ctx)
    }
}

impl<I, O, P: Transform<I, O> + ?Sized> Transform<I, O> for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn process(&self, batch: Batch<I>, ctx: &RunContext) -> Result<Batch<O>, OperatorError> {
        (**self).process(batch, ctx)
    }
}

impl<T, S: Sink<T> + ?Sized> Sink<T> for Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write(&self, batch: &[T], ctx: &RunContext) -> Result<(), OperatorError> {
        (**self).write(batch, ctx)
    }
}

/// Strips the module path and generic arguments from a type name.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A closure-backed source.
pub struct FnSource<F> {
    name: String,
    func: F,
}

impl<F> FnSource<F> {
    /// Creates a new closure-backed source.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource").field("name", &self.name).finish()
    }
}

impl<T, F> Source<T> for FnSource<F>
where
    F: Fn(&RunContext) -> Result<Option<Batch<T>>, OperatorError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn next_batch(&self, ctx: &RunContext) -> Result<Option<Batch<T>>, OperatorError> {
        (self.func)(ctx)
    }
}

/// A closure-backed transform.
pub struct FnTransform<F> {
    name: String,
    func: F,
}

impl<F> FnTransform<F> {
    /// Creates a new closure-backed transform.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnTransform<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform").field("name", &self.name).finish()
    }
}

impl<I, O, F> Transform<I, O> for FnTransform<F>
where
    F: Fn(Batch<I>, &RunContext) -> Result<Batch<O>, OperatorError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, batch: Batch<I>, ctx: &RunContext) -> Result<Batch<O>, OperatorError> {
        (self.func)(batch, ctx)
    }
}

/// A closure-backed sink.
pub struct FnSink<F> {
    name: String,
    func: F,
}

impl<F> FnSink<F> {
    /// Creates a new closure-backed sink.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSink").field("name", &self.name).finish()
    }
}

impl<T, F> Sink<T> for FnSink<F>
where
    F: Fn(&[T], &RunContext) -> Result<(), OperatorError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, batch: &[T], ctx: &RunContext) -> Result<(), OperatorError> {
        (self.func)(batch, ctx)
    }
}
