//! Deduplication and the single outbound flush of a run

use crate::sink::{FlushBatch, RemoteSink};
use crate::state::Record;
use crate::storage::{KeyValueStore, RESULTS_KEY};
use crate::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// Drops records whose identity key was already seen, keeping first occurrences
/// in their original order
pub fn dedupe(records: &[Record]) -> Vec<Record> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .filter(|record| seen.insert(record.identity_key()))
        .cloned()
        .collect()
}

/// Result of a confirmed flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReceipt {
    /// Records in the outbound batch
    pub sent: usize,

    /// Records dropped as duplicates before sending
    pub duplicates_removed: usize,

    /// Records the sink reported as stored
    pub accepted: usize,
}

/// Sends the accumulated result set and clears it once the sink confirms
#[derive(Clone)]
pub struct Flusher {
    store: Arc<dyn KeyValueStore>,
    sink: Arc<dyn RemoteSink>,
}

impl Flusher {
    pub fn new(store: Arc<dyn KeyValueStore>, sink: Arc<dyn RemoteSink>) -> Self {
        Self { store, sink }
    }

    /// Deduplicates `records` and sends them in one batch
    ///
    /// The persisted result set is removed only after the sink confirms. On any
    /// failure the store is left untouched so the flush can be retried. An empty
    /// batch makes no outbound call.
    ///
    /// # Arguments
    ///
    /// * `records` - The accumulated result set
    /// * `source_context` - Address of the page the run finished on
    ///
    /// # Returns
    ///
    /// * `Ok(FlushReceipt)` - The sink accepted the batch
    /// * `Err(HarvestError::Sink)` - The sink was unreachable or rejected the batch
    /// * `Err(HarvestError::Store)` - The confirmed batch could not be cleared locally
    pub async fn flush(&self, records: &[Record], source_context: &str) -> Result<FlushReceipt> {
        let unique = dedupe(records);
        let duplicates_removed = records.len() - unique.len();

        if unique.is_empty() {
            tracing::info!("Nothing to flush");
            self.store.remove(RESULTS_KEY).await?;
            return Ok(FlushReceipt {
                sent: 0,
                duplicates_removed,
                accepted: 0,
            });
        }

        if duplicates_removed > 0 {
            tracing::info!("Removed {} duplicate listings before flush", duplicates_removed);
        }

        let batch = FlushBatch {
            records: unique,
            source_context: source_context.to_string(),
        };

        let receipt = self.sink.send(&batch).await.map_err(|e| {
            tracing::warn!("Flush failed, keeping {} records for retry: {}", records.len(), e);
            e
        })?;

        self.store.remove(RESULTS_KEY).await.map_err(|e| {
            tracing::error!("Flush confirmed but local results could not be cleared: {}", e);
            e
        })?;

        tracing::info!(
            "Flushed {} listings ({} accepted)",
            batch.records.len(),
            receipt.accepted
        );

        Ok(FlushReceipt {
            sent: batch.records.len(),
            duplicates_removed,
            accepted: receipt.accepted,
        })
    }
}
