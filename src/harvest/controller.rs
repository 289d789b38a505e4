//! Pagination controller and control surface
//!
//! A `Harvester` is bound to one page. It processes that page, then either asks
//! the navigator for the next page and stops (the host replaces the page and with
//! it this instance), or finalizes the run. Everything that must outlive the page
//! is written to the key-value store after each step, so a fresh instance on the
//! next page picks up exactly where this one stopped.

use crate::harvest::{
    admit, Clock, EngineConfig, Flusher, Hydrator, PageExtractor, RecordMapper, Stabilizer,
    TokioClock,
};
use crate::page::{DomSource, Navigator};
use crate::sink::RemoteSink;
use crate::state::{QuotaSnapshot, Record, ResultSet, RunPhase, RunState, Tier};
use crate::storage::{load_json, save_json, KeyValueStore, StoreError, RESULTS_KEY, RUN_STATE_KEY};
use crate::{HarvestError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// What one control-surface invocation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationReport {
    /// Records admitted during this invocation
    pub records_this_invocation: usize,

    /// True if the quota limit was reached
    pub limit_reached: bool,

    /// Size of the accumulated result set at the end of the invocation
    pub cumulative_count: usize,

    pub outcome: RunOutcome,
}

/// How an invocation ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunOutcome {
    /// Navigation to the next page was requested; the run continues there
    #[serde(rename_all = "camelCase")]
    Continuing { next_url: String },

    /// The run was flushed and its persisted state cleared
    Finalized { accepted: usize },

    /// The flush failed; persisted state is kept for a retry
    FlushFailed { reason: String },
}

/// Persisted progress, readable at any time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSummary {
    pub run_state: Option<RunState>,
    pub record_count: usize,
    pub last_updated: Option<DateTime<Utc>>,

    /// True while this instance is processing an invocation
    pub in_progress: bool,
}

/// Resets the in-progress flag when an invocation ends, however it ends
struct InvocationGuard<'a> {
    harvester: &'a Harvester,
}

impl Drop for InvocationGuard<'_> {
    fn drop(&mut self) {
        let mut phase = match self.harvester.phase.lock() {
            Ok(phase) => phase,
            Err(poisoned) => poisoned.into_inner(),
        };
        if matches!(*phase, RunPhase::Running | RunPhase::Finalizing) {
            *phase = RunPhase::Idle;
        }
        drop(phase);
        self.harvester.in_progress.store(false, Ordering::Release);
    }
}

/// The extraction engine for one page
pub struct Harvester {
    config: EngineConfig,
    dom: Arc<dyn DomSource>,
    store: Arc<dyn KeyValueStore>,
    sink: Arc<dyn RemoteSink>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    extractor: PageExtractor,
    in_progress: AtomicBool,
    phase: Mutex<RunPhase>,
}

impl Harvester {
    /// Creates an engine bound to the page behind `dom`
    ///
    /// # Arguments
    ///
    /// * `config` - Timing and quota policy
    /// * `dom` - The current page
    /// * `store` - Persistence that survives navigation
    /// * `sink` - Destination of the flushed result set
    /// * `navigator` - Replaces the current page
    pub fn new(
        config: EngineConfig,
        dom: Arc<dyn DomSource>,
        store: Arc<dyn KeyValueStore>,
        sink: Arc<dyn RemoteSink>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            dom,
            store,
            sink,
            navigator,
            clock: Arc::new(TokioClock),
            extractor: PageExtractor::default(),
            in_progress: AtomicBool::new(false),
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    /// Replaces the clock used for every wait
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the mapping from listing nodes to records
    pub fn with_mapper(mut self, mapper: Arc<dyn RecordMapper>) -> Self {
        self.extractor = PageExtractor::new(mapper);
        self
    }

    /// Current controller phase of this instance
    pub fn phase(&self) -> RunPhase {
        match self.phase.lock() {
            Ok(phase) => *phase,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Returns true while an invocation is being processed
    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Starts or continues a multi-page run on the current page
    ///
    /// If a run is already persisted, its page index is kept and the page budget,
    /// tier and limit are updated; otherwise a new run starts at page 1.
    ///
    /// # Arguments
    ///
    /// * `max_pages` - Page budget for the run
    /// * `tier` - Account tier
    /// * `quota` - Caller-supplied quota; only the limit is used
    ///
    /// # Returns
    ///
    /// * `Ok(InvocationReport)` - The page was processed
    /// * `Err(HarvestError::AlreadyRunning)` - An invocation is already in progress
    /// * `Err(HarvestError)` - The page or the store failed
    pub async fn start_multi_page_run(
        &self,
        max_pages: u32,
        tier: Tier,
        quota: QuotaSnapshot,
    ) -> Result<InvocationReport> {
        let _guard = self.enter()?;
        let limit = quota.limit.unwrap_or(self.config.restricted_limit);

        let state = match self.load_run_state().await? {
            Some(mut state) => {
                state.max_pages = max_pages.max(1);
                state.tier = tier;
                state.quota.limit = limit;
                tracing::info!(
                    "Continuing persisted run at page {} of {}",
                    state.page_index,
                    state.max_pages
                );
                state
            }
            None => {
                tracing::info!("Starting run: {} pages, {} tier", max_pages.max(1), tier);
                RunState::new(max_pages, tier, limit)
            }
        };

        self.run_page(state).await
    }

    /// Re-enters a persisted run on the current page
    ///
    /// Called on every fresh page. Returns `Ok(None)` when no run is persisted.
    pub async fn resume(&self) -> Result<Option<InvocationReport>> {
        let _guard = self.enter()?;

        match self.load_run_state().await? {
            Some(state) => {
                tracing::info!(
                    "Resuming run at page {} of {}",
                    state.page_index,
                    state.max_pages
                );
                self.run_page(state).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Extracts the current page into the accumulated result set and flushes it
    ///
    /// Does not create a run. Refused while a multi-page run is persisted, since
    /// the flush would send that run's records early.
    pub async fn scrape_single_page(
        &self,
        tier: Tier,
        quota: QuotaSnapshot,
    ) -> Result<InvocationReport> {
        let _guard = self.enter()?;

        if self.load_run_state().await?.is_some() {
            tracing::warn!("A multi-page run is persisted; refusing single-page scrape");
            return Err(HarvestError::AlreadyRunning);
        }

        self.set_phase(RunPhase::Running);
        let limit = quota.limit.unwrap_or(self.config.restricted_limit);
        let mut state = RunState::new(1, tier, limit);
        let mut results = self.load_results().await?;
        state.quota.used = results.len();

        if state.quota_exhausted() {
            tracing::info!("Quota of {} listings already reached", state.quota.limit);
            return self.finalize(None, results, 0, true).await;
        }

        let candidates = self.process_page().await?;
        let admission = admit(candidates, &state);
        let admitted = admission.admitted.len();
        results.append(admission.admitted);
        self.save_results(&results).await?;

        tracing::info!(
            "Found {} listings on this page. Total: {}",
            admitted,
            results.len()
        );

        self.finalize(None, results, admitted, admission.limit_reached)
            .await
    }

    /// Removes the persisted run and result set
    pub async fn clear_state(&self) -> Result<()> {
        let _guard = self.enter()?;

        self.store.remove(RUN_STATE_KEY).await.map_err(store_failure)?;
        self.store.remove(RESULTS_KEY).await.map_err(store_failure)?;

        tracing::info!("Cleared persisted run and results");
        Ok(())
    }

    /// Reads the persisted run and result set without changing anything
    pub async fn persisted_summary(&self) -> Result<PersistedSummary> {
        let run_state = self.load_run_state().await?;
        let results = self.load_results().await?;

        Ok(PersistedSummary {
            run_state,
            record_count: results.len(),
            last_updated: results.last_updated,
            in_progress: self.is_in_progress(),
        })
    }

    /// Returns the persisted records awaiting a flush
    pub async fn persisted_results(&self) -> Result<ResultSet> {
        self.load_results().await
    }

    /// Flushes the persisted result set without extracting anything
    ///
    /// Used to retry after a failed flush. On success the persisted run is
    /// cleared as well.
    pub async fn flush_pending(&self) -> Result<InvocationReport> {
        let _guard = self.enter()?;

        let state = self.load_run_state().await?;
        let results = self.load_results().await?;
        let limit_reached = state.map(|s| s.quota_exhausted()).unwrap_or(false);

        tracing::info!("Retrying flush of {} persisted listings", results.len());
        self.finalize(state, results, 0, limit_reached).await
    }

    /// Processes the current page of a run and decides what comes next
    async fn run_page(&self, mut state: RunState) -> Result<InvocationReport> {
        self.set_phase(RunPhase::Running);

        let mut results = self.load_results().await?;
        state.quota.used = results.len();

        if state.quota_exhausted() {
            tracing::info!(
                "Quota of {} listings already reached, finalizing",
                state.quota.limit
            );
            self.save_run_state(&state).await?;
            return self.finalize(Some(state), results, 0, true).await;
        }

        let (admitted, limit_reached) = if results.contains_page(state.page_index) {
            // Records were saved but the checkpoint after them was not
            tracing::info!(
                "Page {} already recorded, skipping extraction",
                state.page_index
            );
            (0, false)
        } else {
            tracing::info!("Processing page {} of {}", state.page_index, state.max_pages);

            let candidates = self.process_page().await?;
            let admission = admit(candidates, &state);
            let admitted = admission.admitted.len();

            results.append_page(admission.admitted, state.page_index);
            self.save_results(&results).await?;
            state.quota.used = results.len();
            self.save_run_state(&state).await?;

            tracing::info!(
                "Found {} listings on page {}. Total: {}",
                admitted,
                state.page_index,
                results.len()
            );
            (admitted, admission.limit_reached)
        };

        if limit_reached {
            tracing::info!("Quota of {} listings reached", state.quota.limit);
            return self.finalize(Some(state), results, admitted, true).await;
        }

        if let Some(next_url) = self.continuation_target(&state).await? {
            state.page_index += 1;
            self.save_run_state(&state).await?;

            self.clock.sleep(self.config.navigation_settle).await;
            self.navigator.navigate(&next_url).await?;
            self.set_phase(RunPhase::Continuing);

            tracing::info!("Continuing to page {}: {}", state.page_index, next_url);
            return Ok(InvocationReport {
                records_this_invocation: admitted,
                limit_reached: false,
                cumulative_count: results.len(),
                outcome: RunOutcome::Continuing { next_url },
            });
        }

        self.finalize(Some(state), results, admitted, false).await
    }

    /// Returns the next-page target if the run should continue
    async fn continuation_target(&self, state: &RunState) -> Result<Option<String>> {
        if !state.has_page_budget() {
            tracing::info!("Page budget of {} exhausted", state.max_pages);
            return Ok(None);
        }

        let next = self.dom.next_page().await?;
        match next.as_ref().and_then(|n| n.target()) {
            Some(target) => Ok(Some(target.to_string())),
            None => {
                tracing::info!("No further pages available");
                Ok(None)
            }
        }
    }

    /// Waits for the page to settle, hydrates it and extracts its records
    async fn process_page(&self) -> Result<Vec<Record>> {
        let dom = self.dom.as_ref();
        let clock = self.clock.as_ref();

        let count = Stabilizer::new(self.config.stabilization.clone())
            .await_stable_count(dom, clock)
            .await?;
        tracing::debug!("{} listings rendered before hydration", count);

        let hydration = Hydrator::new(self.config.hydration.clone())
            .hydrate(dom, clock)
            .await?;
        tracing::debug!(
            "Hydrated in {} steps ({} load-more activations)",
            hydration.steps,
            hydration.load_more_clicks
        );

        Ok(self.extractor.extract_page(dom).await?)
    }

    /// Flushes the accumulated result set and clears the run on success
    async fn finalize(
        &self,
        state: Option<RunState>,
        results: ResultSet,
        records_this_invocation: usize,
        limit_reached: bool,
    ) -> Result<InvocationReport> {
        self.set_phase(RunPhase::Finalizing);

        let flusher = Flusher::new(self.store.clone(), self.sink.clone());
        let outcome = match flusher
            .flush(&results.records, &self.dom.current_url())
            .await
        {
            Ok(receipt) => {
                if state.is_some() {
                    self.store
                        .remove(RUN_STATE_KEY)
                        .await
                        .map_err(store_failure)?;
                }
                tracing::info!("Run complete: {} listings accepted", receipt.accepted);
                RunOutcome::Finalized {
                    accepted: receipt.accepted,
                }
            }
            Err(HarvestError::Sink(e)) => RunOutcome::FlushFailed {
                reason: e.to_string(),
            },
            Err(e) => return Err(e),
        };

        self.set_phase(RunPhase::Idle);
        Ok(InvocationReport {
            records_this_invocation,
            limit_reached,
            cumulative_count: results.len(),
            outcome,
        })
    }

    /// Marks an invocation as in progress, rejecting re-entry
    fn enter(&self) -> Result<InvocationGuard<'_>> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Harvest already in progress");
            return Err(HarvestError::AlreadyRunning);
        }
        let guard = InvocationGuard { harvester: self };

        if self.phase() == RunPhase::Continuing {
            tracing::warn!("Navigation already requested from this page");
            return Err(HarvestError::AlreadyRunning);
        }
        Ok(guard)
    }

    fn set_phase(&self, to: RunPhase) {
        let mut phase = match self.phase.lock() {
            Ok(phase) => phase,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !phase.can_transition_to(to) {
            tracing::warn!("Unexpected phase change {} -> {}", *phase, to);
        }
        tracing::debug!("Phase {} -> {}", *phase, to);
        *phase = to;
    }

    async fn load_run_state(&self) -> Result<Option<RunState>> {
        load_json(self.store.as_ref(), RUN_STATE_KEY)
            .await
            .map_err(store_failure)
    }

    async fn save_run_state(&self, state: &RunState) -> Result<()> {
        save_json(self.store.as_ref(), RUN_STATE_KEY, state)
            .await
            .map_err(store_failure)
    }

    async fn load_results(&self) -> Result<ResultSet> {
        let results: Option<ResultSet> = load_json(self.store.as_ref(), RESULTS_KEY)
            .await
            .map_err(store_failure)?;
        Ok(results.unwrap_or_default())
    }

    async fn save_results(&self, results: &ResultSet) -> Result<()> {
        save_json(self.store.as_ref(), RESULTS_KEY, results)
            .await
            .map_err(store_failure)
    }
}

fn store_failure(e: StoreError) -> HarvestError {
    tracing::error!("Store operation failed: {}", e);
    HarvestError::Store(e)
}
