//! The harvest engine
//!
//! This module contains the pagination controller and the components it drives,
//! in the order a page is processed:
//! - `Stabilizer`: waits for asynchronously rendered listings to settle
//! - `Hydrator`: scrolls lazily loaded content into the page
//! - `PageExtractor`: reads listings into records, isolating per-record failures
//! - `admit`: enforces the restricted-tier quota
//! - `Flusher`: deduplicates and sends the accumulated result set once per run
//!
//! `Harvester` ties these together behind the control surface, and `Command`
//! exposes that surface as a typed request/response boundary.

mod clock;
mod command;
mod controller;
mod extractor;
mod flush;
mod hydrator;
mod quota;
mod stabilizer;

pub use clock::{Clock, TokioClock};
pub use command::{Command, Response};
pub use controller::{Harvester, InvocationReport, PersistedSummary, RunOutcome};
pub use extractor::{ExtractError, FieldMapping, PageExtractor, RecordMapper};
pub use flush::{dedupe, FlushReceipt, Flusher};
pub use hydrator::{HydrationPolicy, HydrationSummary, Hydrator};
pub use quota::{admit, Admission};
pub use stabilizer::{StabilizationPolicy, Stabilizer};

use std::time::Duration;

/// Timing and quota policy for one engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub stabilization: StabilizationPolicy,

    pub hydration: HydrationPolicy,

    /// Wait between persisting the next page index and navigating
    pub navigation_settle: Duration,

    /// Quota limit used when the caller does not supply one
    pub restricted_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stabilization: StabilizationPolicy::default(),
            hydration: HydrationPolicy::default(),
            navigation_settle: Duration::from_millis(2000),
            restricted_limit: 10,
        }
    }
}
