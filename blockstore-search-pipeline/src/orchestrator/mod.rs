//! One indexer per source type, behind a single dispatch point.
//!
//! The upstream producer hands every decoded [`SourceRecord`] to an
//! [`IndexerSet`], which routes it to the indexer for its type. Event logs are
//! routed by event name; events nobody registered an index for are skipped
//! and counted.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::errors::PipelineError;
use crate::indexer::{FailedBatch, Indexer, IndexerConfig};
use crate::mapper::SearchableRecord;
use crate::writer::RetryingBulkWriter;
use blockstore_search_shared::schema::presets;
use blockstore_search_shared::{
    Block, Contract, EventLog, IndexActionKind, IndexSchemaDescriptor, SourceRecord, Transaction,
};

type FlushFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PipelineError>> + Send + 'a>>;

/// Progress of one indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerStats {
    pub index: String,
    pub pending: usize,
    pub indexed: u64,
}

pub struct IndexerSet {
    blocks: Indexer<Block>,
    transactions: Indexer<Transaction>,
    contracts: Indexer<Contract>,
    events: HashMap<String, Indexer<EventLog>>,
    writer: Arc<RetryingBulkWriter>,
    config: IndexerConfig,
    index_prefix: String,
    failed_tx: Option<mpsc::UnboundedSender<FailedBatch>>,
    skipped: AtomicU64,
}

impl IndexerSet {
    /// Create indexers for blocks, transactions and contracts.
    ///
    /// Every index name is prefixed with `index_prefix`.
    pub fn new(
        writer: Arc<RetryingBulkWriter>,
        config: IndexerConfig,
        index_prefix: &str,
        failed_tx: Option<mpsc::UnboundedSender<FailedBatch>>,
    ) -> Result<Self, PipelineError> {
        let blocks = build(presets::blocks(), index_prefix, &writer, config, &failed_tx)?;
        let transactions =
            build(presets::transactions(), index_prefix, &writer, config, &failed_tx)?;
        let contracts = build(presets::contracts(), index_prefix, &writer, config, &failed_tx)?;

        Ok(Self {
            blocks,
            transactions,
            contracts,
            events: HashMap::new(),
            writer,
            config,
            index_prefix: index_prefix.to_string(),
            failed_tx,
            skipped: AtomicU64::new(0),
        })
    }

    /// Register an index for event logs named `event_name`.
    pub fn with_event_indexer(
        mut self,
        event_name: impl Into<String>,
        schema: IndexSchemaDescriptor,
    ) -> Result<Self, PipelineError> {
        let indexer = build(
            schema,
            &self.index_prefix,
            &self.writer,
            self.config,
            &self.failed_tx,
        )?;
        self.events.insert(event_name.into(), indexer);
        Ok(self)
    }

    pub fn blocks(&self) -> &Indexer<Block> {
        &self.blocks
    }

    pub fn transactions(&self) -> &Indexer<Transaction> {
        &self.transactions
    }

    pub fn contracts(&self) -> &Indexer<Contract> {
        &self.contracts
    }

    pub fn event(&self, event_name: &str) -> Option<&Indexer<EventLog>> {
        self.events.get(event_name)
    }

    /// Descriptors of every managed index.
    pub fn schemas(&self) -> Vec<Arc<IndexSchemaDescriptor>> {
        let mut schemas = vec![
            self.blocks.schema().clone(),
            self.transactions.schema().clone(),
            self.contracts.schema().clone(),
        ];
        let mut events: Vec<_> = self.events.values().map(|i| i.schema().clone()).collect();
        events.sort_by(|a, b| a.name().cmp(b.name()));
        schemas.extend(events);
        schemas
    }

    /// Event logs dropped because no index was registered for them.
    pub fn skipped_events(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Create every managed index that does not exist yet.
    pub async fn ensure_indexes(&self) -> Result<(), PipelineError> {
        self.blocks.ensure_index().await?;
        self.transactions.ensure_index().await?;
        self.contracts.ensure_index().await?;
        for indexer in self.events.values() {
            indexer.ensure_index().await?;
        }
        info!(count = 3 + self.events.len(), "Indexes ready");
        Ok(())
    }

    /// Upsert one record into the index for its type.
    pub async fn index(&self, record: &SourceRecord) -> Result<(), PipelineError> {
        self.index_with(record, IndexActionKind::default()).await
    }

    pub async fn index_with(
        &self,
        record: &SourceRecord,
        kind: IndexActionKind,
    ) -> Result<(), PipelineError> {
        match record {
            SourceRecord::Block(block) => self.blocks.index(block, kind).await,
            SourceRecord::Transaction(tx) => self.transactions.index(tx, kind).await,
            SourceRecord::Contract(contract) => self.contracts.index(contract, kind).await,
            SourceRecord::EventLog(event) => match self.events.get(&event.event_name) {
                Some(indexer) => indexer.index(event, kind).await,
                None => {
                    self.skip(event);
                    Ok(())
                }
            },
        }
    }

    /// Route a slice of records, one `index_many` call per target indexer.
    ///
    /// Every group is attempted; the first error is returned.
    pub async fn index_many(
        &self,
        records: &[SourceRecord],
        kind: IndexActionKind,
    ) -> Result<(), PipelineError> {
        let mut blocks = Vec::new();
        let mut transactions = Vec::new();
        let mut contracts = Vec::new();
        let mut events: HashMap<&str, Vec<&EventLog>> = HashMap::new();

        for record in records {
            match record {
                SourceRecord::Block(block) => blocks.push(block),
                SourceRecord::Transaction(tx) => transactions.push(tx),
                SourceRecord::Contract(contract) => contracts.push(contract),
                SourceRecord::EventLog(event) => {
                    if self.events.contains_key(&event.event_name) {
                        events.entry(event.event_name.as_str()).or_default().push(event);
                    } else {
                        self.skip(event);
                    }
                }
            }
        }

        let mut results = vec![
            self.blocks.index_many(blocks, kind).await,
            self.transactions.index_many(transactions, kind).await,
            self.contracts.index_many(contracts, kind).await,
        ];
        for (name, group) in events {
            if let Some(indexer) = self.events.get(name) {
                results.push(indexer.index_many(group, kind).await);
            }
        }

        results.into_iter().collect()
    }

    /// Flush every indexer concurrently.
    ///
    /// All indexers are flushed even if some fail; the first error is returned.
    #[instrument(skip(self))]
    pub async fn flush_all(&self) -> Result<(), PipelineError> {
        let mut flushes: Vec<FlushFuture<'_>> = vec![
            Box::pin(self.blocks.flush()) as FlushFuture<'_>,
            Box::pin(self.transactions.flush()),
            Box::pin(self.contracts.flush()),
        ];
        flushes.extend(
            self.events
                .values()
                .map(|indexer| Box::pin(indexer.flush()) as FlushFuture<'_>),
        );

        let results = join_all(flushes).await;
        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            error!(error = %err, "Flush failed");
        }
        results.into_iter().collect()
    }

    pub fn stats(&self) -> Vec<IndexerStats> {
        let mut stats = vec![
            stats_of(&self.blocks),
            stats_of(&self.transactions),
            stats_of(&self.contracts),
        ];
        let mut events: Vec<_> = self.events.values().map(stats_of).collect();
        events.sort_by(|a, b| a.index.cmp(&b.index));
        stats.extend(events);
        stats
    }

    /// Flush and close every indexer.
    ///
    /// Every indexer is closed even if an earlier one fails to flush.
    pub async fn close(&self) -> Result<(), PipelineError> {
        let mut results = vec![
            self.blocks.close().await,
            self.transactions.close().await,
            self.contracts.close().await,
        ];
        for indexer in self.events.values() {
            results.push(indexer.close().await);
        }

        info!(skipped_events = self.skipped_events(), "Indexers closed");
        results.into_iter().collect()
    }

    fn skip(&self, event: &EventLog) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
        debug!(event = %event.event_name, "No index registered for event, skipping");
    }
}

fn build<R: SearchableRecord + 'static>(
    schema: IndexSchemaDescriptor,
    index_prefix: &str,
    writer: &Arc<RetryingBulkWriter>,
    config: IndexerConfig,
    failed_tx: &Option<mpsc::UnboundedSender<FailedBatch>>,
) -> Result<Indexer<R>, PipelineError> {
    let indexer = Indexer::new(schema.with_prefix(index_prefix), writer.clone(), config)?;
    Ok(match failed_tx {
        Some(tx) => indexer.with_failed_batch_sender(tx.clone()),
        None => indexer,
    })
}

fn stats_of<R>(indexer: &Indexer<R>) -> IndexerStats {
    IndexerStats {
        index: indexer.name().to_string(),
        pending: indexer.pending_document_count(),
        indexed: indexer.indexed_count(),
    }
}
