//! # Blockstore Search Pipeline
//!
//! Moves decoded blockchain records into a search index and reads them back.
//!
//! ## Architecture
//!
//! Records flow through four stages per source type:
//!
//! 1. **Mapper**: Turns a record into a flat document with a stable key
//! 2. **Buffer**: Accumulates index actions until the batch size is reached
//! 3. **Writer**: Submits a batch, retrying transient failures
//! 4. **Indexer**: Ties the three together and tracks progress
//!
//! The [`IndexerSet`] routes each record to the indexer for its type and the
//! [`QueryFacade`] serves search, suggest and count for one index.

pub mod buffer;
pub mod errors;
pub mod indexer;
pub mod mapper;
pub mod orchestrator;
pub mod query;
pub mod writer;

pub use buffer::BatchingBuffer;
pub use errors::{MappingError, PipelineError, QueryError, WriteError};
pub use indexer::{FailedBatch, Indexer, IndexerConfig, MapFn};
pub use mapper::{map_record, SearchableRecord};
pub use orchestrator::{IndexerSet, IndexerStats};
pub use query::{QueryConfig, QueryFacade};
pub use writer::{Backoff, RetryPolicy, RetryingBulkWriter};
