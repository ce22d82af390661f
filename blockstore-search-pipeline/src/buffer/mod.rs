//! Batching buffer.
//!
//! Accumulates index actions for one document type until the batch size is
//! reached or a flush is requested. The buffer is not synchronized itself; the
//! owning [`Indexer`](crate::indexer::Indexer) keeps it behind a lock so that
//! append, threshold check and drain happen as one step.

use blockstore_search_shared::IndexAction;

/// Default number of documents per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug)]
pub struct BatchingBuffer {
    actions: Vec<IndexAction>,
    batch_size: usize,
}

impl BatchingBuffer {
    /// Create an empty buffer. A batch size of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            actions: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn append(&mut self, action: IndexAction) {
        self.actions.push(action);
    }

    pub fn extend(&mut self, actions: impl IntoIterator<Item = IndexAction>) {
        self.actions.extend(actions);
    }

    /// Number of buffered actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Whether the buffer holds at least one full batch.
    pub fn should_flush(&self) -> bool {
        self.actions.len() >= self.batch_size
    }

    /// Take every buffered action, leaving a fresh empty buffer.
    pub fn drain_for_flush(&mut self) -> Vec<IndexAction> {
        std::mem::replace(&mut self.actions, Vec::with_capacity(self.batch_size))
    }
}

impl Default for BatchingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
