//! Thread-safe property bag shared by every operator in a run.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A thread-safe key/value bag.
///
/// Writes are last-write-wins: setting an existing key replaces its value.
#[derive(Debug, Default)]
pub struct PropertyBag {
    data: RwLock<HashMap<String, serde_json::Value>>,
}

impl PropertyBag {
    /// Creates a new empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag from existing data.
    #[must_use]
    pub fn from_data(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Gets a value from the bag.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().get(key).cloned()
    }

    /// Gets a value, falling back to `default` when the key is absent.
    #[must_use]
    pub fn get_or(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
        self.get(key).unwrap_or(default)
    }

    /// Gets a value and deserializes it into `T`.
    ///
    /// Returns `None` if the key is absent or the value has a different shape.
    #[must_use]
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .read()
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Sets a value, returning the previous one.
    pub fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.data.write().insert(key.into(), value.into())
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    /// Removes a key, returning its value.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.data.write().remove(key)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the bag is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}
