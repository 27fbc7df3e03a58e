//! The mutable context shared by every operator of one pipeline run.

use super::PropertyBag;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Shared state for a single pipeline run.
///
/// Every operator receives the run's context on each call and may read or
/// write its properties; hooks and callers read it after completion. A
/// context belongs to exactly one pipeline instance.
#[derive(Debug)]
pub struct RunContext {
    /// Unique ID for this run.
    run_id: Uuid,
    /// Name of the owning pipeline.
    pipeline: String,
    /// Wall-clock start, set when the run begins.
    started_at: RwLock<Option<DateTime<Utc>>>,
    /// Monotonic start, paired with `finished`.
    started: RwLock<Option<Instant>>,
    /// Monotonic end, set when the run reaches a terminal state.
    finished: RwLock<Option<Instant>>,
    /// Arbitrary properties.
    properties: PropertyBag,
    /// Batches pulled from the source.
    batch_count: AtomicU64,
    /// Records pulled from the source.
    record_count: AtomicU64,
}

impl RunContext {
    /// Creates a new context with a generated run ID.
    #[must_use]
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self::with_run_id(pipeline, Uuid::new_v4())
    }

    /// Creates a context with a specific run ID.
    #[must_use]
    pub fn with_run_id(pipeline: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            started_at: RwLock::new(None),
            started: RwLock::new(None),
            finished: RwLock::new(None),
            properties: PropertyBag::new(),
            batch_count: AtomicU64::new(0),
            record_count: AtomicU64::new(0),
        }
    }

    /// Seeds initial properties.
    #[must_use]
    pub fn with_properties(mut self, properties: HashMap<String, serde_json::Value>) -> Self {
        self.properties = PropertyBag::from_data(properties);
        self
    }

    /// Returns the run ID.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the owning pipeline's name.
    #[must_use]
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Returns when the run started, if it has.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        *self.started_at.read()
    }

    /// Returns the time spent in the run so far, or in total once finished.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        let Some(start) = *self.started.read() else {
            return Duration::ZERO;
        };
        match *self.finished.read() {
            Some(end) => end.saturating_duration_since(start),
            None => start.elapsed(),
        }
    }

    /// Gets a property value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.properties.get(key)
    }

    /// Gets a property value or `default`.
    #[must_use]
    pub fn get_or(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        self.properties.get_or(key, default)
    }

    /// Gets a property and deserializes it into `T`.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.properties.get_as(key)
    }

    /// Sets a property, replacing any previous value.
    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.properties.set(key, value)
    }

    /// Checks if a property exists.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.properties.has(key)
    }

    /// Removes a property.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.properties.remove(key)
    }

    /// Returns the property bag.
    #[must_use]
    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    /// Returns the number of batches pulled from the source.
    #[must_use]
    pub fn batch_count(&self) -> u64 {
        self.batch_count.load(Ordering::SeqCst)
    }

    /// Returns the number of records pulled from the source.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_count.load(Ordering::SeqCst)
    }

    /// Counts one pulled batch of `records` records.
    pub fn record_batch(&self, records: usize) {
        self.batch_count.fetch_add(1, Ordering::SeqCst);
        self.record_count.fetch_add(records as u64, Ordering::SeqCst);
    }

    pub(crate) fn mark_started(&self) {
        *self.started_at.write() = Some(Utc::now());
        *self.started.write() = Some(Instant::now());
    }

    pub(crate) fn mark_finished(&self) {
        *self.finished.write() = Some(Instant::now());
    }
}
