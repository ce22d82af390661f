//! Error types for the indexing pipeline.

use blockstore_search_repository::{BulkResponse, SearchIndexError};
use blockstore_search_shared::SchemaError;
use thiserror::Error;

/// A source record could not be turned into a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Record for index {index} is missing required field '{field}'")]
    MissingRequiredField { index: String, field: String },

    #[error("Record for index {0} produced an empty document key")]
    EmptyKey(String),
}

/// A batch could not be written to the search index.
#[derive(Debug, Clone, Error)]
pub enum WriteError {
    /// Every attempt failed with a transient error.
    #[error("Bulk submit failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: SearchIndexError,
    },

    /// The index refused the request; retrying would not help.
    #[error("Bulk submit rejected: {0}")]
    Rejected(#[source] SearchIndexError),

    /// The request went through but some actions were refused.
    #[error(
        "{} of {} action(s) rejected by the index",
        .response.total() - .response.succeeded(),
        .response.total()
    )]
    PartialFailure { response: BulkResponse },
}

/// A read-path call failed. Never retried.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("Field '{facet}' is not facetable in index {index}")]
    UnknownFacet { index: String, facet: String },

    #[error("Index {0} has no suggest-eligible fields")]
    SuggestUnsupported(String),

    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),
}

/// Errors that can occur in the indexing pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Error mapping a record into a document.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// A flush failed; the affected documents were dropped.
    #[error("Write failure for index {index}, {dropped} document(s) dropped: {source}")]
    WriteFailure {
        index: String,
        dropped: usize,
        #[source]
        source: WriteError,
    },

    /// Error from the search index outside of a batch write.
    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),

    /// A descriptor failed validation.
    #[error("Invalid schema: {0}")]
    InvalidSchema(#[from] SchemaError),

    /// The indexer was closed.
    #[error("Indexer for index {0} is closed")]
    Closed(String),
}

impl PipelineError {
    /// Number of documents this error caused to be dropped.
    pub fn dropped(&self) -> usize {
        match self {
            Self::WriteFailure { dropped, .. } => *dropped,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockstore_search_repository::BulkItemResult;
    use blockstore_search_shared::IndexActionKind;

    #[test]
    fn test_partial_failure_message() {
        let err = WriteError::PartialFailure {
            response: BulkResponse::new(vec![
                BulkItemResult::ok("1", IndexActionKind::MergeOrUpload, 201),
                BulkItemResult::failed("2", IndexActionKind::Upload, 409, "exists"),
            ]),
        };
        assert_eq!(err.to_string(), "1 of 2 action(s) rejected by the index");
    }

    #[test]
    fn test_dropped() {
        let err = PipelineError::WriteFailure {
            index: "blocks".to_string(),
            dropped: 4,
            source: WriteError::Rejected(SearchIndexError::validation("bad")),
        };
        assert_eq!(err.dropped(), 4);
        assert_eq!(PipelineError::Closed("blocks".to_string()).dropped(), 0);
    }
}
