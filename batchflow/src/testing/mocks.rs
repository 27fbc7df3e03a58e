//! Mock operators.

use crate::context::RunContext;
use crate::errors::{ErrorKind, OperatorError};
use crate::operators::{Batch, Sink, Source, Transform};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A source that emits a fixed list of batches, then end-of-stream.
#[derive(Debug)]
pub struct VecSource<T> {
    name: String,
    batches: Mutex<VecDeque<Batch<T>>>,
    pulls: AtomicUsize,
    delay: Duration,
}

impl<T> VecSource<T> {
    /// Creates a source emitting `batches` in order.
    pub fn new(name: impl Into<String>, batches: Vec<Batch<T>>) -> Self {
        Self {
            name: name.into(),
            batches: Mutex::new(batches.into()),
            pulls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Creates a source emitting `items` in batches of `batch_size`.
    pub fn from_items(name: impl Into<String>, items: Vec<T>, batch_size: usize) -> Self {
        let size = batch_size.max(1);
        let mut batches = Vec::with_capacity(items.len().div_ceil(size));
        let mut iter = items.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push(iter.by_ref().take(size).collect());
        }
        Self::new(name, batches)
    }

    /// Sleeps for `delay` on every pull.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the number of pulls, including the end-of-stream pull.
    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    /// Returns the number of batches not yet emitted.
    pub fn remaining(&self) -> usize {
        self.batches.lock().len()
    }
}

impl<T: Send> Source<T> for VecSource<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_batch(&self, _ctx: &RunContext) -> Result<Option<Batch<T>>, OperatorError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(self.batches.lock().pop_front())
    }
}

/// A transform that returns its input, optionally after a delay.
#[derive(Debug, Default)]
pub struct PassthroughTransform {
    name: Option<String>,
    delay: Duration,
    calls: AtomicUsize,
}

impl PassthroughTransform {
    /// Creates a passthrough transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sleeps for `delay` on every call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the number of calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T> Transform<T, T> for PassthroughTransform {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("passthrough")
    }

    fn process(&self, batch: Batch<T>, _ctx: &RunContext) -> Result<Batch<T>, OperatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(batch)
    }
}

/// A passthrough transform that fails its first `failures` calls.
#[derive(Debug)]
pub struct FlakyTransform {
    name: String,
    failures: usize,
    kind: ErrorKind,
    calls: AtomicUsize,
}

impl FlakyTransform {
    /// Creates a transform failing `failures` times with a transient error.
    pub fn new(name: impl Into<String>, failures: usize) -> Self {
        Self {
            name: name.into(),
            failures,
            kind: ErrorKind::Transient,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sets the kind of the injected failures.
    #[must_use]
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns the number of calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T> Transform<T, T> for FlakyTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, batch: Batch<T>, _ctx: &RunContext) -> Result<Batch<T>, OperatorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(OperatorError::new(
                self.kind.clone(),
                format!("injected failure {call} of {}", self.failures),
            ));
        }
        Ok(batch)
    }
}

/// A sink that keeps a copy of every batch it sees.
#[derive(Debug)]
pub struct CollectingSink<T> {
    name: String,
    batches: Mutex<Vec<Batch<T>>>,
}

impl<T: Clone> CollectingSink<T> {
    /// Creates an empty collecting sink.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Returns every batch written, in order.
    pub fn batches(&self) -> Vec<Batch<T>> {
        self.batches.lock().clone()
    }

    /// Returns every item written, in order.
    pub fn items(&self) -> Vec<T> {
        self.batches.lock().concat()
    }

    /// Returns the number of write calls.
    pub fn calls(&self) -> usize {
        self.batches.lock().len()
    }
}

impl<T: Clone + Send> Sink<T> for CollectingSink<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, batch: &[T], _ctx: &RunContext) -> Result<(), OperatorError> {
        self.batches.lock().push(batch.to_vec());
        Ok(())
    }
}

/// A sink that always fails.
#[derive(Debug)]
pub struct FailingSink {
    name: String,
    kind: ErrorKind,
    calls: AtomicUsize,
}

impl FailingSink {
    /// Creates a sink failing with a fatal error.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ErrorKind::Fatal,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sets the kind of the failures.
    #[must_use]
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns the number of calls.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T> Sink<T> for FailingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&self, batch: &[T], _ctx: &RunContext) -> Result<(), OperatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(OperatorError::new(
            self.kind.clone(),
            format!("{} rejected {} record(s)", self.name, batch.len()),
        ))
    }
}
