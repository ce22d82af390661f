//! Newline-delimited JSON ingest.
//!
//! Each line holds one tagged [`SourceRecord`], for example
//! `{"type":"block","number":1,...}`. Lines are handed to the [`IndexerSet`]
//! in order until the input ends or shutdown is requested.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::IndexingError;
use blockstore_search_pipeline::{FailedBatch, IndexerSet, PipelineError};
use blockstore_search_shared::SourceRecord;

/// What happened to the lines read by one [`run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Records accepted by an indexer.
    pub records: u64,
    /// Lines that were not a valid record.
    pub malformed: u64,
    /// Records the mapper refused.
    pub rejected: u64,
    /// Flushes that failed while indexing.
    pub write_failures: u64,
}

/// Read records from `reader` until end of input or until `shutdown` resolves.
///
/// Bad lines and failed flushes are logged and counted; only a closed
/// indexer or a read error stops the loop early.
#[instrument(skip_all)]
pub async fn run<R, S>(
    reader: R,
    indexers: &IndexerSet,
    shutdown: S,
) -> Result<IngestStats, IndexingError>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = reader.lines();
    let mut stats = IngestStats::default();
    tokio::pin!(shutdown);

    info!("Reading records");

    loop {
        tokio::select! {
            // Shutdown wins over input that is already available
            biased;

            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("Input ended");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                ingest_line(line, indexers, &mut stats).await?;
            }
        }
    }

    info!(
        records = stats.records,
        malformed = stats.malformed,
        rejected = stats.rejected,
        write_failures = stats.write_failures,
        "Ingest finished"
    );
    Ok(stats)
}

async fn ingest_line(
    line: &str,
    indexers: &IndexerSet,
    stats: &mut IngestStats,
) -> Result<(), IndexingError> {
    let record: SourceRecord = match serde_json::from_str(line) {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, "Skipping malformed record");
            stats.malformed += 1;
            return Ok(());
        }
    };

    match indexers.index(&record).await {
        Ok(()) => stats.records += 1,
        Err(PipelineError::Mapping(e)) => {
            warn!(source_type = %record.source_type(), error = %e, "Record rejected by mapper");
            stats.rejected += 1;
        }
        Err(e @ PipelineError::Closed(_)) => return Err(e.into()),
        Err(e) => {
            // The record itself was buffered; the failed flush is already reported
            stats.records += 1;
            stats.write_failures += 1;
            error!(error = %e, "Failed to index records");
        }
    }
    Ok(())
}

/// Log every batch the indexers dropped until all senders are gone.
pub async fn log_failed_batches(mut rx: mpsc::UnboundedReceiver<FailedBatch>) -> u64 {
    let mut dropped = 0u64;
    while let Some(batch) = rx.recv().await {
        dropped += batch.actions.len() as u64;
        error!(
            batch_id = %batch.batch_id,
            index = %batch.index,
            count = batch.actions.len(),
            error = %batch.error,
            "Batch dropped"
        );
        for action in &batch.actions {
            debug!(batch_id = %batch.batch_id, key = %action.key(), "Dropped document");
        }
    }
    dropped
}
