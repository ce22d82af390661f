//! Dependency initialization and wiring for the search indexer.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::Settings;
use crate::IndexingError;
use blockstore_search_pipeline::{FailedBatch, IndexerSet, QueryFacade, RetryingBulkWriter};
use blockstore_search_repository::{OpenSearchClient, SearchIndexProvider};
use blockstore_search_shared::schema::presets;

/// Event names with a dedicated index.
const TRANSFER_EVENT: &str = "Transfer";
const APPROVAL_EVENT: &str = "Approval";

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Indexers for every source type, ready to receive records.
    pub indexers: Arc<IndexerSet>,
    provider: Arc<dyn SearchIndexProvider>,
    queries: HashMap<String, QueryFacade>,
    failed_rx: Option<mpsc::UnboundedReceiver<FailedBatch>>,
}

impl Dependencies {
    /// Connect to OpenSearch and wire the pipeline.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies with every index created
    /// * `Err(IndexingError)` - If the cluster is unreachable or unhealthy
    pub async fn new(settings: &Settings) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            index_prefix = %settings.index_prefix,
            batch_size = settings.indexer.batch_size,
            max_attempts = settings.retry.max_attempts,
            "Initializing dependencies"
        );

        let client = OpenSearchClient::new(&settings.opensearch_url, settings.index)
            .await
            .map_err(|e| {
                IndexingError::config(format!("Failed to create OpenSearch client: {}", e))
            })?;

        // Verify OpenSearch is reachable
        let healthy = client
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch health check failed: {}", e)))?;

        if !healthy {
            return Err(IndexingError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");

        Self::with_provider(settings, Arc::new(client)).await
    }

    /// Wire the pipeline on top of an existing provider.
    pub async fn with_provider(
        settings: &Settings,
        provider: Arc<dyn SearchIndexProvider>,
    ) -> Result<Self, IndexingError> {
        let writer = Arc::new(RetryingBulkWriter::new(provider.clone(), settings.retry));
        let (failed_tx, failed_rx) = mpsc::unbounded_channel();

        let indexers = IndexerSet::new(
            writer,
            settings.indexer,
            &settings.index_prefix,
            Some(failed_tx),
        )?
        .with_event_indexer(TRANSFER_EVENT, presets::erc20_transfer())?
        .with_event_indexer(APPROVAL_EVENT, presets::erc20_approval())?;

        indexers.ensure_indexes().await?;

        let queries = indexers
            .schemas()
            .into_iter()
            .map(|schema| {
                let name = schema.name().to_string();
                let facade = QueryFacade::new(provider.clone(), schema, settings.query);
                (name, facade)
            })
            .collect();

        Ok(Self {
            indexers: Arc::new(indexers),
            provider,
            queries,
            failed_rx: Some(failed_rx),
        })
    }

    /// Query facade for an index, by its full (prefixed) name.
    pub fn query(&self, index: &str) -> Option<&QueryFacade> {
        self.queries.get(index)
    }

    /// Receiver for batches the indexers dropped. Can be taken once.
    pub fn take_failed_batches(&mut self) -> Option<mpsc::UnboundedReceiver<FailedBatch>> {
        self.failed_rx.take()
    }

    /// Flush and close every indexer, then release the search client.
    pub async fn shutdown(&self) -> Result<(), IndexingError> {
        let flushed = self.indexers.close().await;
        if let Err(e) = &flushed {
            warn!(error = %e, "Failed to flush remaining documents");
        }

        for stats in self.indexers.stats() {
            info!(index = %stats.index, indexed = stats.indexed, "Final index count");
        }

        self.provider.close().await?;
        info!("Search client closed");
        flushed.map_err(IndexingError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstore_search_repository::InMemorySearchIndex;
    use blockstore_search_shared::{Block, SourceRecord};

    fn block(number: u64) -> Block {
        serde_json::from_value(serde_json::json!({
            "number": number,
            "hash": format!("0x{:x}", number),
            "parent_hash": "0x0",
            "miner": "0xm1",
            "timestamp": "2020-01-01T00:00:00Z",
            "gas_limit": 1,
            "gas_used": 1,
            "size": 1,
            "transaction_count": 0
        }))
        .unwrap()
    }

    fn settings() -> Settings {
        Settings {
            index_prefix: "dev-".to_string(),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_wiring_creates_every_index() {
        let memory = Arc::new(InMemorySearchIndex::new());
        let deps = Dependencies::with_provider(&settings(), memory.clone())
            .await
            .unwrap();

        for name in [
            "dev-blocks",
            "dev-transactions",
            "dev-contracts",
            "dev-erc20-transfer",
            "dev-erc20-approval",
        ] {
            assert!(memory.index_exists(name).await, "{} missing", name);
            assert!(deps.query(name).is_some(), "no facade for {}", name);
        }
        assert!(deps.indexers.event(APPROVAL_EVENT).is_some());
    }

    #[tokio::test]
    async fn test_shutdown_flushes_then_closes() {
        let memory = Arc::new(InMemorySearchIndex::new());
        let deps = Dependencies::with_provider(&settings(), memory.clone())
            .await
            .unwrap();

        deps.indexers
            .index(&SourceRecord::Block(block(1)))
            .await
            .unwrap();
        assert_eq!(deps.indexers.blocks().pending_document_count(), 1);

        deps.shutdown().await.unwrap();

        assert!(memory.get("dev-blocks", "1").await.is_some());
        assert!(memory.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_batches_receiver_taken_once() {
        let mut deps =
            Dependencies::with_provider(&settings(), Arc::new(InMemorySearchIndex::new()))
                .await
                .unwrap();

        assert!(deps.take_failed_batches().is_some());
        assert!(deps.take_failed_batches().is_none());
    }
}
