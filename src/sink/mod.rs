//! Remote sink for flushed records
//!
//! The sink accepts one deduplicated batch per completed run. Any failure leaves the
//! persisted result set untouched so the flush can be retried later.

mod http;

pub use http::HttpSink;

use crate::state::Record;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while sending a batch
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("No credential configured for the remote sink")]
    MissingCredential,

    #[error("Sink unreachable: {0}")]
    Transport(String),

    #[error("Sink rejected the batch (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed sink response: {0}")]
    MalformedResponse(String),
}

/// One outbound batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushBatch {
    pub records: Vec<Record>,

    /// Page the run finished on
    pub source_context: String,
}

/// Confirmation returned by the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkReceipt {
    /// Number of records the sink reports as stored
    pub accepted: usize,
}

/// Destination for deduplicated record batches
#[async_trait]
pub trait RemoteSink: Send + Sync {
    async fn send(&self, batch: &FlushBatch) -> Result<SinkReceipt, SinkError>;
}
