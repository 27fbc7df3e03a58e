//! Batch splitters: decompose one pulled batch into ordered sub-batches.
//!
//! When a splitter says a batch should be split, the pipeline runs every
//! sub-batch through the full operator chain, in emission order, before it
//! pulls the next batch.

use crate::errors::ConfigError;
use crate::operators::Batch;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Policy for decomposing a batch into an ordered sequence of sub-batches.
pub trait BatchSplitter<T>: Send + Sync {
    /// Returns true if `batch` should be split before processing.
    fn should_split(&self, batch: &[T]) -> bool;

    /// Splits `batch` into sub-batches whose concatenation holds every
    /// element of the original exactly once.
    fn split(&self, batch: Batch<T>) -> Vec<Batch<T>>;
}

impl<T, S: BatchSplitter<T> + ?Sized> BatchSplitter<T> for Arc<S> {
    fn should_split(&self, batch: &[T]) -> bool {
        (**self).should_split(batch)
    }

    fn split(&self, batch: Batch<T>) -> Vec<Batch<T>> {
        (**self).split(batch)
    }
}

/// Never splits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSplitter;

impl<T> BatchSplitter<T> for NoOpSplitter {
    fn should_split(&self, _batch: &[T]) -> bool {
        false
    }

    fn split(&self, batch: Batch<T>) -> Vec<Batch<T>> {
        vec![batch]
    }
}

/// Splits into contiguous chunks of at most `size` elements.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizeSplitter {
    size: usize,
}

impl FixedSizeSplitter {
    /// Creates a splitter for chunks of `size` elements.
    ///
    /// Returns an error if `size` is zero.
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        if size == 0 {
            return Err(ConfigError::new("split_size", "must be at least 1"));
        }
        Ok(Self { size })
    }

    /// Returns the chunk size.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl<T> BatchSplitter<T> for FixedSizeSplitter {
    fn should_split(&self, batch: &[T]) -> bool {
        batch.len() > self.size
    }

    fn split(&self, batch: Batch<T>) -> Vec<Batch<T>> {
        let mut chunks = Vec::with_capacity(batch.len().div_ceil(self.size));
        let mut iter = batch.into_iter().peekable();
        while iter.peek().is_some() {
            chunks.push(iter.by_ref().take(self.size).collect());
        }
        chunks
    }
}

/// Groups elements by the label a classifier assigns.
///
/// One sub-batch is emitted per label, in order of each label's first
/// appearance; element order within a group is preserved.
pub struct PredicatePartition<T, K> {
    classifier: Arc<dyn Fn(&T) -> K + Send + Sync>,
}

impl<T, K> PredicatePartition<T, K> {
    /// Creates a partitioner from a classifier.
    pub fn new<F>(classifier: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            classifier: Arc::new(classifier),
        }
    }
}

impl<T, K> Clone for PredicatePartition<T, K> {
    fn clone(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
        }
    }
}

impl<T, K> fmt::Debug for PredicatePartition<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicatePartition").finish_non_exhaustive()
    }
}

impl<T, K> BatchSplitter<T> for PredicatePartition<T, K>
where
    K: Eq + Hash,
{
    fn should_split(&self, batch: &[T]) -> bool {
        let mut iter = batch.iter().map(|item| (self.classifier)(item));
        match iter.next() {
            Some(first) => iter.any(|label| label != first),
            None => false,
        }
    }

    fn split(&self, batch: Batch<T>) -> Vec<Batch<T>> {
        let mut groups: Vec<Batch<T>> = Vec::new();
        let mut index: HashMap<K, usize> = HashMap::new();

        for item in batch {
            let label = (self.classifier)(&item);
            let slot = *index.entry(label).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(item);
        }
        groups
    }
}
