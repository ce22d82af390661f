//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::BulkResponse;
use blockstore_search_shared::{
    IndexAction, IndexSchemaDescriptor, SearchRequest, SearchResult, SuggestRequest, SuggestResult,
};

/// Abstracts the remote search index the pipeline writes to and queries.
///
/// Every call names its target through the [`IndexSchemaDescriptor`] of the
/// document type, so one provider serves every index. Implementations are
/// shared between indexers and query facades behind an `Arc`.
///
/// All methods return `Result<T, SearchIndexError>`; callers decide whether to
/// retry by asking [`SearchIndexError::is_transient`].
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Create the index for a document type if it does not exist yet.
    ///
    /// # Arguments
    ///
    /// * `schema` - Descriptor the index mapping is derived from
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index exists or was created
    /// * `Err(SearchIndexError)` - If creation fails
    async fn ensure_index(&self, schema: &IndexSchemaDescriptor) -> Result<(), SearchIndexError>;

    /// Submit a batch of actions in one bulk request.
    ///
    /// A request-level failure is returned as `Err`. When the request itself
    /// succeeds, the outcome of every action is reported in the returned
    /// [`BulkResponse`], in submission order.
    ///
    /// # Arguments
    ///
    /// * `schema` - Descriptor of the target index
    /// * `actions` - The actions to apply, all for this index
    async fn submit_batch(
        &self,
        schema: &IndexSchemaDescriptor,
        actions: &[IndexAction],
    ) -> Result<BulkResponse, SearchIndexError>;

    /// Run a full-text search with facet counts.
    async fn search(
        &self,
        schema: &IndexSchemaDescriptor,
        request: &SearchRequest,
    ) -> Result<SearchResult, SearchIndexError>;

    /// Return prefix suggestions over the requested fields.
    async fn suggest(
        &self,
        schema: &IndexSchemaDescriptor,
        request: &SuggestRequest,
    ) -> Result<SuggestResult, SearchIndexError>;

    /// Count the documents currently stored in the index.
    async fn count(&self, schema: &IndexSchemaDescriptor) -> Result<u64, SearchIndexError>;

    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the search engine is healthy
    /// * `Ok(false)` - If the search engine is unhealthy
    /// * `Err(SearchIndexError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, SearchIndexError>;

    /// Release the connection. Every later call fails with
    /// [`SearchIndexError::Closed`].
    async fn close(&self) -> Result<(), SearchIndexError>;
}
