//! Per-source-type indexer.
//!
//! An [`Indexer`] composes the mapper, a [`BatchingBuffer`] and the shared
//! [`RetryingBulkWriter`] for one document type. It is the entry point the
//! upstream producer calls once per observed record.
//!
//! Append, threshold check and drain happen under the buffer lock; the bulk
//! submit runs after the lock is released so other callers can keep
//! appending while a flush is in flight. A failed flush drops its documents:
//! they are published on the optional failed-batch channel and never
//! re-buffered.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::buffer::{BatchingBuffer, DEFAULT_BATCH_SIZE};
use crate::errors::{MappingError, PipelineError, WriteError};
use crate::mapper::{map_record, SearchableRecord};
use crate::writer::RetryingBulkWriter;
use blockstore_search_shared::{Document, IndexAction, IndexActionKind, IndexSchemaDescriptor};

/// Maps one record into a document for the given descriptor.
pub type MapFn<R> =
    Arc<dyn Fn(&R, &IndexSchemaDescriptor) -> Result<Document, MappingError> + Send + Sync>;

/// Configuration for an indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerConfig {
    /// Number of buffered documents that triggers a flush.
    pub batch_size: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Actions dropped by a failed flush, handed back to the producer.
#[derive(Debug, Clone)]
pub struct FailedBatch {
    pub batch_id: Uuid,
    pub index: String,
    pub actions: Vec<IndexAction>,
    pub error: String,
}

pub struct Indexer<R> {
    schema: Arc<IndexSchemaDescriptor>,
    mapper: MapFn<R>,
    writer: Arc<RetryingBulkWriter>,
    buffer: Mutex<BatchingBuffer>,
    indexed: AtomicU64,
    closed: AtomicBool,
    failed_tx: Option<mpsc::UnboundedSender<FailedBatch>>,
}

impl<R: SearchableRecord + 'static> Indexer<R> {
    /// Create an indexer using the record's own field enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSchema`] if the descriptor is inconsistent.
    pub fn new(
        schema: IndexSchemaDescriptor,
        writer: Arc<RetryingBulkWriter>,
        config: IndexerConfig,
    ) -> Result<Self, PipelineError> {
        let mapper: MapFn<R> = Arc::new(|record: &R, schema: &IndexSchemaDescriptor| {
            map_record(record, schema)
        });
        Self::with_mapper(schema, writer, config, mapper)
    }
}

impl<R> Indexer<R> {
    /// Create an indexer with a caller-supplied mapping function.
    pub fn with_mapper(
        schema: IndexSchemaDescriptor,
        writer: Arc<RetryingBulkWriter>,
        config: IndexerConfig,
        mapper: MapFn<R>,
    ) -> Result<Self, PipelineError> {
        schema.validate()?;

        Ok(Self {
            schema: Arc::new(schema),
            mapper,
            writer,
            buffer: Mutex::new(BatchingBuffer::new(config.batch_size)),
            indexed: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            failed_tx: None,
        })
    }

    /// Publish every terminally failed batch on `sender`.
    pub fn with_failed_batch_sender(mut self, sender: mpsc::UnboundedSender<FailedBatch>) -> Self {
        self.failed_tx = Some(sender);
        self
    }

    pub fn schema(&self) -> &Arc<IndexSchemaDescriptor> {
        &self.schema
    }

    /// Name of the target index.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Documents buffered but not yet submitted.
    pub fn pending_document_count(&self) -> usize {
        self.lock_buffer().len()
    }

    /// Documents successfully submitted since the indexer was created.
    pub fn indexed_count(&self) -> u64 {
        self.indexed.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Create the target index if it does not exist.
    pub async fn ensure_index(&self) -> Result<(), PipelineError> {
        self.writer.provider().ensure_index(&self.schema).await?;
        Ok(())
    }

    /// Map and buffer one record, flushing first if the batch is full.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Mapping`] - The record was not buffered
    /// * [`PipelineError::WriteFailure`] - The triggered flush failed
    /// * [`PipelineError::Closed`] - The indexer was closed
    pub async fn index(&self, record: &R, kind: IndexActionKind) -> Result<(), PipelineError> {
        self.ensure_open()?;
        let document = (self.mapper)(record, &self.schema)?;

        let drained = {
            let mut buffer = self.lock_buffer();
            self.ensure_open()?;
            buffer.append(IndexAction::new(kind, document));
            buffer.should_flush().then(|| buffer.drain_for_flush())
        };

        match drained {
            Some(actions) => self.submit_drained(actions).await,
            None => Ok(()),
        }
    }

    /// Map and buffer several records, evaluating the flush threshold once.
    ///
    /// All records are mapped before any is buffered: a mapping failure
    /// leaves the buffer untouched.
    pub async fn index_many<'a, I>(
        &self,
        records: I,
        kind: IndexActionKind,
    ) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = &'a R>,
        R: 'a,
    {
        self.ensure_open()?;
        let actions = records
            .into_iter()
            .map(|record| {
                (self.mapper)(record, &self.schema).map(|document| IndexAction::new(kind, document))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if actions.is_empty() {
            return Ok(());
        }

        let drained = {
            let mut buffer = self.lock_buffer();
            self.ensure_open()?;
            buffer.extend(actions);
            buffer.should_flush().then(|| buffer.drain_for_flush())
        };

        match drained {
            Some(actions) => self.submit_drained(actions).await,
            None => Ok(()),
        }
    }

    /// Submit everything buffered, regardless of the threshold.
    pub async fn flush(&self) -> Result<(), PipelineError> {
        let actions = self.lock_buffer().drain_for_flush();
        self.submit_drained(actions).await
    }

    /// Flush remaining documents and refuse further indexing.
    ///
    /// Closing an already closed indexer does nothing.
    pub async fn close(&self) -> Result<(), PipelineError> {
        let actions = {
            let mut buffer = self.lock_buffer();
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            buffer.drain_for_flush()
        };

        let result = self.submit_drained(actions).await;
        info!(
            index = %self.schema.name(),
            indexed = self.indexed_count(),
            "Indexer closed"
        );
        result
    }

    fn ensure_open(&self) -> Result<(), PipelineError> {
        if self.is_closed() {
            return Err(PipelineError::Closed(self.schema.name().to_string()));
        }
        Ok(())
    }

    fn lock_buffer(&self) -> MutexGuard<'_, BatchingBuffer> {
        // The buffer holds plain data; a panic elsewhere cannot leave it half-updated.
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit drained actions in batches of at most the batch size.
    ///
    /// Every batch is attempted even if an earlier one fails; the first
    /// failure is returned with the total number of dropped documents.
    #[instrument(skip(self, actions), fields(index = %self.schema.name(), count = actions.len()))]
    async fn submit_drained(&self, actions: Vec<IndexAction>) -> Result<(), PipelineError> {
        if actions.is_empty() {
            return Ok(());
        }

        let batch_size = self.lock_buffer().batch_size();
        let mut dropped = 0usize;
        let mut first_error: Option<WriteError> = None;

        let mut remaining = actions;
        while !remaining.is_empty() {
            let rest = remaining.split_off(batch_size.min(remaining.len()));
            let batch = std::mem::replace(&mut remaining, rest);

            match self.writer.submit(&self.schema, &batch).await {
                Ok(response) => {
                    self.indexed.fetch_add(response.total() as u64, Ordering::AcqRel);
                    debug!(count = batch.len(), "Flushed batch");
                }
                Err(e) => {
                    let failed_actions = match &e {
                        WriteError::PartialFailure { response } => {
                            self.indexed
                                .fetch_add(response.succeeded() as u64, Ordering::AcqRel);
                            batch
                                .into_iter()
                                .zip(&response.items)
                                .filter(|(_, item)| !item.succeeded())
                                .map(|(action, _)| action)
                                .collect()
                        }
                        _ => batch,
                    };

                    dropped += failed_actions.len();
                    error!(
                        error = %e,
                        dropped = failed_actions.len(),
                        "Dropping documents from failed batch"
                    );
                    self.publish_failed(failed_actions, &e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(source) => Err(PipelineError::WriteFailure {
                index: self.schema.name().to_string(),
                dropped,
                source,
            }),
            None => Ok(()),
        }
    }

    fn publish_failed(&self, actions: Vec<IndexAction>, error: &WriteError) {
        let Some(tx) = &self.failed_tx else {
            return;
        };
        if actions.is_empty() {
            return;
        }

        let batch = FailedBatch {
            batch_id: Uuid::new_v4(),
            index: self.schema.name().to_string(),
            actions,
            error: error.to_string(),
        };
        if tx.send(batch).is_err() {
            warn!(index = %self.schema.name(), "Failed-batch receiver dropped");
        }
    }
}
