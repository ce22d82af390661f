//! Read path for one index: search, suggest and document count.
//!
//! Calls go straight to the provider. Nothing is cached and nothing is retried.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::errors::QueryError;
use blockstore_search_repository::SearchIndexProvider;
use blockstore_search_shared::{
    IndexSchemaDescriptor, SearchRequest, SearchResult, SuggestRequest, SuggestResult,
};

pub const DEFAULT_SEARCH_PAGE_SIZE: usize = 20;
pub const DEFAULT_SUGGEST_PAGE_SIZE: usize = 8;
pub const DEFAULT_FACET_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    pub search_page_size: usize,
    pub suggest_page_size: usize,
    /// Buckets returned per facet.
    pub facet_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            search_page_size: DEFAULT_SEARCH_PAGE_SIZE,
            suggest_page_size: DEFAULT_SUGGEST_PAGE_SIZE,
            facet_size: DEFAULT_FACET_SIZE,
        }
    }
}

pub struct QueryFacade {
    provider: Arc<dyn SearchIndexProvider>,
    schema: Arc<IndexSchemaDescriptor>,
    config: QueryConfig,
}

impl QueryFacade {
    pub fn new(
        provider: Arc<dyn SearchIndexProvider>,
        schema: Arc<IndexSchemaDescriptor>,
        config: QueryConfig,
    ) -> Self {
        Self {
            provider,
            schema,
            config,
        }
    }

    pub fn schema(&self) -> &IndexSchemaDescriptor {
        &self.schema
    }

    /// Full-text search over the searchable fields.
    ///
    /// When `facets` is `None`, counts are returned for every facetable field
    /// of the index.
    ///
    /// # Errors
    ///
    /// * [`QueryError::UnknownFacet`] - A requested facet is not facetable
    /// * [`QueryError::SearchIndex`] - The index call failed
    #[instrument(skip(self, facets), fields(index = %self.schema.name()))]
    pub async fn search(
        &self,
        text: &str,
        facets: Option<Vec<String>>,
    ) -> Result<SearchResult, QueryError> {
        let facetable = self.schema.facetable_fields();
        let facets = match facets {
            Some(requested) => {
                if let Some(unknown) = requested.iter().find(|f| !facetable.contains(&f.as_str())) {
                    return Err(QueryError::UnknownFacet {
                        index: self.schema.name().to_string(),
                        facet: unknown.clone(),
                    });
                }
                requested
            }
            None => facetable.into_iter().map(str::to_string).collect(),
        };

        let request = SearchRequest::new(text, self.config.search_page_size)
            .with_facets(facets)
            .with_facet_size(self.config.facet_size);
        let result = self.provider.search(&self.schema, &request).await?;

        debug!(total = result.total, hits = result.hits.len(), "Search completed");
        Ok(result)
    }

    /// Prefix suggestions over the suggest-eligible fields.
    ///
    /// An empty prefix yields no suggestions without calling the index.
    #[instrument(skip(self), fields(index = %self.schema.name()))]
    pub async fn suggest(&self, prefix: &str, fuzzy: bool) -> Result<SuggestResult, QueryError> {
        let fields: Vec<String> = self
            .schema
            .suggestible_fields()
            .into_iter()
            .map(str::to_string)
            .collect();
        if fields.is_empty() {
            return Err(QueryError::SuggestUnsupported(self.schema.name().to_string()));
        }
        if prefix.trim().is_empty() {
            return Ok(SuggestResult::default());
        }

        let request = SuggestRequest {
            prefix: prefix.trim().to_string(),
            fields,
            fuzzy,
            top: self.config.suggest_page_size,
        };
        Ok(self.provider.suggest(&self.schema, &request).await?)
    }

    /// Number of documents currently stored in the index.
    pub async fn document_count(&self) -> Result<u64, QueryError> {
        Ok(self.provider.count(&self.schema).await?)
    }
}
