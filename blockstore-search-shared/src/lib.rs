//! # Blockstore Search Shared
//!
//! Plain data types shared by every layer of the blockchain store search indexer:
//! the decoded source records, the flat documents they are mapped into, index
//! actions, schema descriptors and the query/result shapes of the read path.

pub mod action;
pub mod document;
pub mod query;
pub mod records;
pub mod schema;

pub use action::{IndexAction, IndexActionKind};
pub use document::{Document, FieldValue};
pub use query::{
    FacetCount, SearchHit, SearchRequest, SearchResult, SuggestRequest, SuggestResult, Suggestion,
};
pub use records::{
    Block, Contract, EventLog, LogMetadata, SourceRecord, SourceType, Transaction,
};
pub use schema::{FieldDescriptor, FieldType, IndexSchemaDescriptor, SchemaError};
