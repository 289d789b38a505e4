//! Listing-Harvester: a resumable, quota-aware listing extraction engine
//!
//! This crate walks a paginated, infinite-scroll result listing, waits for lazily
//! rendered content to settle, extracts records from every page, checkpoints progress
//! across page reloads, and flushes the deduplicated result set to a remote sink once
//! per completed run.

pub mod config;
pub mod harvest;
pub mod page;
pub mod session;
pub mod sink;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;

use thiserror::Error;

/// Main error type for Listing-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("Page error: {0}")]
    Dom(#[from] page::DomError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] page::NavigationError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("A harvest is already in progress")]
    AlreadyRunning,

    #[error("No persisted run to resume")]
    NoPersistedRun,

    #[error("Command '{0}' needs a page URL")]
    MissingUrl(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Listing-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{Command, Harvester, InvocationReport, Response, RunOutcome};
pub use state::{Quota, Record, ResultSet, RunState, Tier};
