//! In-process collaborators for exercising the engine without a browser,
//! network or real delays

use crate::harvest::Clock;
use crate::page::{
    DomError, DomSource, ListingNode, NavigationError, Navigator, NextPage, ScrollMetrics,
    ScrollSurface,
};
use crate::sink::{FlushBatch, RemoteSink, SinkError, SinkReceipt};
use crate::state::Record;
use crate::storage::{KeyValueStore, MemoryStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Content height added by each activated "load more" control
const LOAD_MORE_GROWTH: u64 = 1000;

#[derive(Debug, Default)]
struct ScrollState {
    container: ScrollMetrics,
    viewport: ScrollMetrics,
    growth: VecDeque<u64>,
    log: Vec<(ScrollSurface, u64)>,
    load_more_remaining: u32,
}

impl ScrollState {
    fn surface(&mut self, surface: ScrollSurface) -> &mut ScrollMetrics {
        match surface {
            ScrollSurface::Container => &mut self.container,
            ScrollSurface::Viewport => &mut self.viewport,
        }
    }
}

/// A scripted listing page
///
/// Listing counts are replayed from a script (repeating the last value once it
/// runs out), scrolling follows a height script, and the next-page affordance is
/// fixed at construction.
#[derive(Debug)]
pub struct ScriptedDom {
    url: String,
    nodes: Vec<ListingNode>,
    counts: Vec<usize>,
    count_samples: Mutex<usize>,
    next: Option<NextPage>,
    scroll: Mutex<ScrollState>,
}

impl ScriptedDom {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            nodes: Vec::new(),
            counts: Vec::new(),
            count_samples: Mutex::new(0),
            next: None,
            scroll: Mutex::new(ScrollState::default()),
        }
    }

    /// Listing counts returned by successive samples
    pub fn with_counts(mut self, counts: Vec<usize>) -> Self {
        self.counts = counts;
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<ListingNode>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Renders `records` as listing nodes
    pub fn with_records(self, records: &[Record]) -> Self {
        let nodes = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let mut node = ListingNode::new(index);
                for (name, value) in [
                    ("id", &record.id),
                    ("link", &record.link),
                    ("address", &record.address),
                ] {
                    if let Some(value) = value {
                        node.fields.insert(name.to_string(), value.clone());
                    }
                }
                node.fields.extend(record.attributes.clone());
                node
            })
            .collect();
        self.with_nodes(nodes)
    }

    /// Renders an enabled next-page affordance
    pub fn with_next(mut self, href: &str) -> Self {
        self.next = Some(NextPage {
            href: Some(href.to_string()),
            enabled: true,
        });
        self
    }

    /// Renders a disabled next-page affordance
    pub fn with_disabled_next(mut self, href: &str) -> Self {
        self.next = Some(NextPage {
            href: Some(href.to_string()),
            enabled: false,
        });
        self
    }

    /// Configures scrolling
    ///
    /// When `container_overflows` is false the container reports no overflow
    /// and the content scrolls in the viewport instead. Each forward scroll
    /// replaces the content height with the next value of `growth`.
    pub fn with_scroll(
        self,
        container_overflows: bool,
        client_height: u64,
        content_height: u64,
        growth: Vec<u64>,
    ) -> Self {
        if let Ok(mut scroll) = self.scroll.lock() {
            let content = ScrollMetrics {
                top: 0,
                scroll_height: content_height,
                client_height,
            };
            let flat = ScrollMetrics {
                top: 0,
                scroll_height: client_height,
                client_height,
            };
            if container_overflows {
                scroll.container = content;
                scroll.viewport = flat;
            } else {
                scroll.container = flat;
                scroll.viewport = content;
            }
            scroll.growth = growth.into();
        }
        self
    }

    /// Number of "load more" controls that will be found and activated
    pub fn with_load_more(self, controls: u32) -> Self {
        if let Ok(mut scroll) = self.scroll.lock() {
            scroll.load_more_remaining = controls;
        }
        self
    }

    /// Number of listing count samples taken so far
    pub fn count_samples(&self) -> usize {
        self.count_samples.lock().map(|n| *n).unwrap_or_default()
    }

    /// Every `scroll_to` call, in order
    pub fn scroll_log(&self) -> Vec<(ScrollSurface, u64)> {
        self.scroll
            .lock()
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    pub fn load_more_remaining(&self) -> u32 {
        self.scroll
            .lock()
            .map(|s| s.load_more_remaining)
            .unwrap_or_default()
    }

    fn poisoned() -> DomError {
        DomError::Query("scripted page state poisoned".to_string())
    }
}

#[async_trait]
impl DomSource for ScriptedDom {
    async fn listing_count(&self) -> Result<usize, DomError> {
        let mut samples = self.count_samples.lock().map_err(|_| Self::poisoned())?;
        let count = if self.counts.is_empty() {
            self.nodes.len()
        } else {
            let index = (*samples).min(self.counts.len() - 1);
            self.counts[index]
        };
        *samples += 1;
        Ok(count)
    }

    async fn listing_nodes(&self) -> Result<Vec<ListingNode>, DomError> {
        Ok(self.nodes.clone())
    }

    async fn scroll_metrics(&self, surface: ScrollSurface) -> Result<ScrollMetrics, DomError> {
        let mut scroll = self.scroll.lock().map_err(|_| Self::poisoned())?;
        Ok(*scroll.surface(surface))
    }

    async fn scroll_to(&self, surface: ScrollSurface, top: u64) -> Result<(), DomError> {
        let mut scroll = self.scroll.lock().map_err(|_| Self::poisoned())?;
        scroll.log.push((surface, top));

        let grown = if top > 0 { scroll.growth.pop_front() } else { None };
        let metrics = scroll.surface(surface);
        if let Some(height) = grown {
            metrics.scroll_height = height;
        }
        metrics.top = top.min(metrics.scroll_height.saturating_sub(metrics.client_height));
        Ok(())
    }

    async fn trigger_load_more(&self, _labels: &[String]) -> Result<bool, DomError> {
        let mut scroll = self.scroll.lock().map_err(|_| Self::poisoned())?;
        if scroll.load_more_remaining == 0 {
            return Ok(false);
        }
        let scroll = &mut *scroll;
        scroll.load_more_remaining -= 1;
        for metrics in [&mut scroll.container, &mut scroll.viewport] {
            if metrics.is_scrollable() {
                metrics.scroll_height += LOAD_MORE_GROWTH;
            }
        }
        Ok(true)
    }

    async fn next_page(&self) -> Result<Option<NextPage>, DomError> {
        Ok(self.next.clone())
    }

    fn current_url(&self) -> String {
        self.url.clone()
    }
}

/// Clock that advances virtual time instead of sleeping
///
/// Each sleep still yields to the scheduler, so concurrent callers interleave at
/// the same points they would with a real clock.
#[derive(Debug, Default)]
pub struct VirtualClock {
    elapsed: Mutex<Duration>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total virtual time slept
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|d| *d).unwrap_or_default()
    }
}

#[async_trait]
impl Clock for VirtualClock {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
        tokio::task::yield_now().await;
    }
}

/// Sink that records every batch and either accepts or fails it
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<FlushBatch>>,
    failure: Mutex<Option<String>>,
}

impl RecordingSink {
    /// A sink that accepts every record it receives
    pub fn accepting() -> Self {
        Self::default()
    }

    /// A sink that fails every call with a transport error
    pub fn failing(reason: &str) -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            failure: Mutex::new(Some(reason.to_string())),
        }
    }

    /// Makes a failing sink accept from now on
    pub fn recover(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    /// Batches received, including failed attempts
    pub fn batches(&self) -> Vec<FlushBatch> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RemoteSink for RecordingSink {
    async fn send(&self, batch: &FlushBatch) -> Result<SinkReceipt, SinkError> {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(batch.clone());
        }

        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        match failure {
            Some(reason) => Err(SinkError::Transport(reason)),
            None => Ok(SinkReceipt {
                accepted: batch.records.len(),
            }),
        }
    }
}

/// Navigator that only records its targets
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    targets: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn navigate(&self, url: &str) -> Result<(), NavigationError> {
        self.targets
            .lock()
            .map_err(|_| NavigationError::Failed("navigator state poisoned".to_string()))?
            .push(url.to_string());
        Ok(())
    }
}

/// Memory store whose writes can be made to fail
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    armed: Mutex<Option<(String, usize)>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `set` and `remove` fail until turned off again
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fails only the `nth` (1-based) upcoming `set` of `key`
    pub fn fail_nth_write(&self, key: &str, nth: usize) {
        if let Ok(mut armed) = self.armed.lock() {
            *armed = Some((key.to_string(), nth));
        }
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("writes disabled".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_armed(&self, key: &str) -> StoreResult<()> {
        let mut armed = self
            .armed
            .lock()
            .map_err(|_| StoreError::Unavailable("store state poisoned".to_string()))?;
        if let Some((target, remaining)) = armed.as_mut() {
            if target.as_str() == key {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    *armed = None;
                    return Err(StoreError::Unavailable(format!("write of {} failed", key)));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.check_armed(key)?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.check_writable()?;
        self.inner.remove(key).await
    }
}
