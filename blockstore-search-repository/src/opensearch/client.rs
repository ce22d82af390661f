//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, CountParts, OpenSearch, SearchParts,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::{build_index_body, IndexConfig};
use crate::opensearch::queries::{
    build_bulk_lines, build_search_query, build_suggest_query, parse_bulk_response,
    parse_count_response, parse_search_response, parse_suggest_response,
};
use crate::types::BulkResponse;
use blockstore_search_shared::{
    IndexAction, IndexSchemaDescriptor, SearchRequest, SearchResult, SuggestRequest, SuggestResult,
};

/// OpenSearch client implementation.
///
/// One client serves every document type; the target index is taken from the
/// descriptor passed to each call.
///
/// # Example
///
/// ```ignore
/// use blockstore_search_repository::opensearch::{IndexConfig, OpenSearchClient};
/// use blockstore_search_shared::schema::presets;
///
/// let client = OpenSearchClient::new("http://localhost:9200", IndexConfig::default()).await?;
/// client.ensure_index(&presets::blocks()).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    index_config: IndexConfig,
    closed: AtomicBool,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - Shard layout used when creating indexes
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            shards = index_config.number_of_shards,
            replicas = index_config.number_of_replicas,
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            index_config,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), SearchIndexError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SearchIndexError::Closed);
        }
        Ok(())
    }

    /// Turn a non-success response into a classified error and decode the body otherwise.
    async fn read_json(response: Response, operation: &str) -> Result<Value, SearchIndexError> {
        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, operation, "Request failed");
            return Err(SearchIndexError::from_status(status.as_u16(), error_body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    /// Create the index with a mapping derived from the descriptor.
    ///
    /// An index created concurrently by another process counts as success.
    #[instrument(skip(self, schema), fields(index = %schema.name()))]
    async fn ensure_index(&self, schema: &IndexSchemaDescriptor) -> Result<(), SearchIndexError> {
        self.ensure_open()?;
        let index = schema.name();

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await?;

        let exists_status = exists.status_code();
        if exists_status.is_success() {
            debug!(index = %index, "Index already exists");
            return Ok(());
        }
        if exists_status.as_u16() != 404 {
            return Err(SearchIndexError::from_status(
                exists_status.as_u16(),
                format!("Checking index {} failed", index),
            ));
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(build_index_body(schema, &self.index_config))
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            if error_body.contains("resource_already_exists_exception") {
                debug!(index = %index, "Index created concurrently");
                return Ok(());
            }
            error!(status = %status, body = %error_body, "Index creation failed");
            return Err(SearchIndexError::from_status(status.as_u16(), error_body));
        }

        info!(index = %index, fields = schema.fields().len(), "Created index");
        Ok(())
    }

    /// Submit the actions as one `_bulk` request.
    ///
    /// Uses `create` for uploads, `index` for merge-or-upload and `delete` for
    /// deletes. Per-item rejections are reported in the [`BulkResponse`].
    #[instrument(skip(self, schema, actions), fields(index = %schema.name(), count = actions.len()))]
    async fn submit_batch(
        &self,
        schema: &IndexSchemaDescriptor,
        actions: &[IndexAction],
    ) -> Result<BulkResponse, SearchIndexError> {
        self.ensure_open()?;
        if actions.is_empty() {
            return Ok(BulkResponse::default());
        }

        let body: Vec<JsonBody<Value>> = build_bulk_lines(schema.name(), actions)
            .into_iter()
            .map(JsonBody::new)
            .collect();

        let response = self
            .client
            .bulk(BulkParts::Index(schema.name()))
            .body(body)
            .send()
            .await?;

        let response_body = Self::read_json(response, "bulk").await?;
        let result = parse_bulk_response(actions, &response_body)?;

        if result.has_failures() {
            warn!(
                index = %schema.name(),
                failed = result.total() - result.succeeded(),
                total = result.total(),
                "Bulk request had item failures"
            );
        } else {
            debug!(index = %schema.name(), total = result.total(), "Bulk request accepted");
        }

        Ok(result)
    }

    async fn search(
        &self,
        schema: &IndexSchemaDescriptor,
        request: &SearchRequest,
    ) -> Result<SearchResult, SearchIndexError> {
        self.ensure_open()?;

        let response = self
            .client
            .search(SearchParts::Index(&[schema.name()]))
            .body(build_search_query(schema, request))
            .send()
            .await?;

        let response_body = Self::read_json(response, "search").await?;
        let result = parse_search_response(&response_body)?;

        debug!(
            index = %schema.name(),
            total = result.total,
            returned = result.hits.len(),
            "Search completed"
        );
        Ok(result)
    }

    async fn suggest(
        &self,
        schema: &IndexSchemaDescriptor,
        request: &SuggestRequest,
    ) -> Result<SuggestResult, SearchIndexError> {
        self.ensure_open()?;

        let response = self
            .client
            .search(SearchParts::Index(&[schema.name()]))
            .body(build_suggest_query(request))
            .send()
            .await?;

        let response_body = Self::read_json(response, "suggest").await?;
        parse_suggest_response(request, &response_body)
    }

    async fn count(&self, schema: &IndexSchemaDescriptor) -> Result<u64, SearchIndexError> {
        self.ensure_open()?;

        let response = self
            .client
            .count(CountParts::Index(&[schema.name()]))
            .send()
            .await?;

        let response_body = Self::read_json(response, "count").await?;
        parse_count_response(&response_body)
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        self.ensure_open()?;

        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await?;

        let health = Self::read_json(response, "health").await?;
        let status = health
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown");

        info!(status = %status, "OpenSearch cluster status");
        Ok(status == "green" || status == "yellow")
    }

    async fn close(&self) -> Result<(), SearchIndexError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("Closed OpenSearch client");
        }
        Ok(())
    }
}
