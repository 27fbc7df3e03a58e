//! Type-erased operator chain.
//!
//! The builder checks item types at compile time; once assembled, every
//! transform and sink is stored as a [`Stage`] exchanging boxed batches.

use super::{Batch, OperatorKind, Sink, Transform};
use crate::context::RunContext;
use crate::errors::OperatorError;
use std::any::{type_name, Any};
use std::marker::PhantomData;

/// A batch with its item type erased.
pub(crate) struct Envelope {
    payload: Box<dyn Any + Send>,
    item_type: &'static str,
    len: usize,
}

impl Envelope {
    pub(crate) fn new<T: Send + 'static>(batch: Batch<T>) -> Self {
        Self {
            len: batch.len(),
            item_type: type_name::<T>(),
            payload: Box::new(batch),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn into_batch<T: 'static>(self) -> Result<Batch<T>, OperatorError> {
        let found = self.item_type;
        self.payload
            .downcast::<Batch<T>>()
            .map(|b| *b)
            .map_err(|_| {
                OperatorError::fatal(format!(
                    "batch type mismatch: expected {}, found {found}",
                    type_name::<T>()
                ))
            })
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("item_type", &self.item_type)
            .field("len", &self.len)
            .finish()
    }
}

/// One link of an assembled chain.
pub(crate) trait Stage: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> OperatorKind;

    fn run(&self, input: Envelope, ctx: &RunContext) -> Result<Envelope, OperatorError>;
}

pub(crate) struct TransformStage<I, O, P> {
    inner: P,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O, P> TransformStage<I, O, P> {
    pub(crate) fn new(inner: P) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<I, O, P> Stage for TransformStage<I, O, P>
where
    I: Send + 'static,
    O: Send + 'static,
    P: Transform<I, O>,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Transform
    }

    fn run(&self, input: Envelope, ctx: &RunContext) -> Result<Envelope, OperatorError> {
        let batch = input.into_batch::<I>()?;
        self.inner.process(batch, ctx).map(Envelope::new)
    }
}

pub(crate) struct SinkStage<T, S> {
    inner: S,
    _marker: PhantomData<fn(T)>,
}

impl<T, S> SinkStage<T, S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<T, S> Stage for SinkStage<T, S>
where
    T: Send + 'static,
    S: Sink<T>,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> OperatorKind {
        OperatorKind::Sink
    }

    fn run(&self, input: Envelope, ctx: &RunContext) -> Result<Envelope, OperatorError> {
        let batch = input.into_batch::<T>()?;
        self.inner.write(&batch, ctx)?;
        Ok(Envelope::new(batch))
    }
}
