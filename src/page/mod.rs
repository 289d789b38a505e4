//! Page collaborators consumed by the harvest engine
//!
//! This module defines what the engine needs from the page it runs against:
//! - `DomSource`: queryable listing nodes, scroll metrics, and the next-page affordance
//! - `Navigator`: replaces the current page (and with it the engine instance)
//!
//! It also contains the host adapters used by the command-line driver:
//! - `HtmlPage`: a static, scraper-parsed snapshot of a listing page
//! - `fetch_page`: downloads a listing page with reqwest
//! - `PendingNavigation`: a navigator that records the target for the driver

mod fetcher;
mod html;
mod navigator;

pub use fetcher::{build_http_client, fetch_page};
pub use html::HtmlPage;
pub use navigator::PendingNavigation;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while querying the page
#[derive(Debug, Error)]
pub enum DomError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Page query failed: {0}")]
    Query(String),

    #[error("Scroll failed: {0}")]
    Scroll(String),
}

/// Errors raised by the navigation primitive
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("Invalid navigation target '{0}'")]
    InvalidTarget(String),

    #[error("Navigation failed: {0}")]
    Failed(String),
}

/// Which element a scroll operation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollSurface {
    /// The most specific scrollable results container
    Container,

    /// The whole viewport
    Viewport,
}

/// Scroll position and extent of a surface, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollMetrics {
    pub top: u64,
    pub scroll_height: u64,
    pub client_height: u64,
}

impl ScrollMetrics {
    /// Returns true if the surface has content overflowing its visible area
    pub fn is_scrollable(&self) -> bool {
        self.scroll_height > self.client_height
    }
}

/// The "next page" affordance of a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    /// Absolute target of the affordance, if it carries one
    pub href: Option<String>,

    /// False when the affordance is rendered but disabled
    pub enabled: bool,
}

impl NextPage {
    /// Returns the navigation target if the affordance is usable
    pub fn target(&self) -> Option<&str> {
        if self.enabled {
            self.href.as_deref().filter(|h| !h.trim().is_empty())
        } else {
            None
        }
    }
}

/// One listing container read from the page
///
/// `fields` holds whatever raw values the page adapter could read; turning them
/// into a `Record` is the job of a `RecordMapper`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingNode {
    /// Position of the node in page order
    pub index: usize,

    pub fields: BTreeMap<String, String>,
}

impl ListingNode {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field value, builder style
    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }
}

/// Queryable view of the current listing page
#[async_trait]
pub trait DomSource: Send + Sync {
    /// Number of listing containers currently rendered
    async fn listing_count(&self) -> Result<usize, DomError>;

    /// All listing containers currently rendered, in page order
    async fn listing_nodes(&self) -> Result<Vec<ListingNode>, DomError>;

    /// Scroll position and extent of `surface`
    async fn scroll_metrics(&self, surface: ScrollSurface) -> Result<ScrollMetrics, DomError>;

    /// Moves the scroll position of `surface` to `top`
    async fn scroll_to(&self, surface: ScrollSurface, top: u64) -> Result<(), DomError>;

    /// Activates the first control whose text matches one of `labels`
    ///
    /// Returns true if a control was found and activated.
    async fn trigger_load_more(&self, labels: &[String]) -> Result<bool, DomError>;

    /// The next-page affordance, if the page renders one
    async fn next_page(&self) -> Result<Option<NextPage>, DomError>;

    /// Address of the current page, sent along with flushed records
    fn current_url(&self) -> String;
}

/// Replaces the current page with a new URL
///
/// From the engine's point of view this is fire-and-forget: once it returns, the
/// current engine instance is expected to be discarded.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), NavigationError>;
}
