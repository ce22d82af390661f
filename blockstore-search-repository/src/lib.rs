//! # Blockstore Search Repository
//!
//! This crate provides the capability the indexing pipeline depends on to
//! reach a search index: the `SearchIndexProvider` trait, its error type, and
//! two implementations, one backed by OpenSearch and one held in memory.

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod types;

pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use memory::InMemorySearchIndex;
pub use opensearch::{IndexConfig, OpenSearchClient};
pub use types::{BulkItemResult, BulkResponse};
