//! Runs the blockstore search pipeline as a process.
//!
//! [`Settings`] come from the environment, [`Dependencies`] wires one indexer
//! per source type against OpenSearch, and [`ingest`] feeds it records read as
//! newline-delimited JSON from stdin until input ends or ctrl-c.

pub mod config;
pub mod ingest;

pub use config::{Dependencies, LogFormat, Settings};

use thiserror::Error;

/// Why the indexer process stopped or failed to start.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// A setting is missing a valid value, or the cluster could not be reached at startup.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Indexing or index creation failed.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] blockstore_search_pipeline::PipelineError),

    /// Closing the search client failed.
    #[error("Search index error: {0}")]
    SearchIndexError(#[from] blockstore_search_repository::SearchIndexError),

    /// Reading records from the input failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexingError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

