use crate::harvest::{EngineConfig, HydrationPolicy, StabilizationPolicy};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Listing-Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stabilization: StabilizationConfig,

    #[serde(default)]
    pub hydration: HydrationConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub quota: QuotaConfig,

    pub sink: SinkConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub listing: ListingConfig,

    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

impl Config {
    /// Builds the timing and quota policy consumed by the engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            stabilization: StabilizationPolicy {
                sample_interval: Duration::from_millis(self.stabilization.sample_interval_ms),
                stability_threshold: self.stabilization.stability_threshold,
                max_attempts: self.stabilization.max_attempts,
            },
            hydration: HydrationPolicy {
                scroll_step: self.hydration.scroll_step,
                settle_delay: Duration::from_millis(self.hydration.settle_delay_ms),
                load_more_delay: Duration::from_millis(self.hydration.load_more_delay_ms),
                max_steps: self.hydration.max_steps,
                bottom_tolerance: self.hydration.bottom_tolerance,
                return_settle: Duration::from_millis(self.hydration.return_settle_ms),
                render_settle: Duration::from_millis(self.hydration.render_settle_ms),
                load_more_labels: self.hydration.load_more_labels.clone(),
            },
            navigation_settle: Duration::from_millis(self.pagination.navigation_settle_ms),
            restricted_limit: self.quota.restricted_limit,
        }
    }
}

/// Polling policy for waiting on asynchronously rendered listings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StabilizationConfig {
    /// Delay between two listing-count samples (milliseconds)
    pub sample_interval_ms: u64,

    /// Consecutive equal samples required before the count is trusted
    pub stability_threshold: u32,

    /// Upper bound on samples taken
    pub max_attempts: u32,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 500,
            stability_threshold: 2,
            max_attempts: 30,
        }
    }
}

/// Scroll-driven hydration of lazily loaded listings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HydrationConfig {
    /// Pixels advanced per scroll step
    pub scroll_step: u64,

    /// Wait after each scroll step (milliseconds)
    pub settle_delay_ms: u64,

    /// Wait after activating a "load more" control (milliseconds)
    pub load_more_delay_ms: u64,

    /// Upper bound on scroll steps
    pub max_steps: u32,

    /// Distance from the end of the content that still counts as the bottom
    pub bottom_tolerance: u64,

    /// Wait after scrolling back to the top (milliseconds)
    pub return_settle_ms: u64,

    /// Extra wait for late rendering before extraction (milliseconds)
    pub render_settle_ms: u64,

    /// Case-insensitive labels of "load more" controls
    pub load_more_labels: Vec<String>,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            scroll_step: 1000,
            settle_delay_ms: 1200,
            load_more_delay_ms: 1200,
            max_steps: 30,
            bottom_tolerance: 100,
            return_settle_ms: 2000,
            render_settle_ms: 4000,
            load_more_labels: vec!["see more".to_string(), "load more".to_string()],
        }
    }
}

/// Multi-page run behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PaginationConfig {
    /// Wait before navigating to the next page (milliseconds)
    pub navigation_settle_ms: u64,

    /// Page budget used when the caller does not supply one
    pub default_max_pages: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            navigation_settle_ms: 2000,
            default_max_pages: 5,
        }
    }
}

/// Quota applied to the restricted tier
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct QuotaConfig {
    /// Default cumulative record limit for restricted accounts
    pub restricted_limit: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            restricted_limit: 10,
        }
    }
}

/// Remote sink that receives flushed batches
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SinkConfig {
    /// Endpoint accepting `POST` batches
    pub endpoint: String,

    /// Credential inlined in the config file
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable consulted when `api-key` is absent
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Header carrying the credential; `Authorization` sends `Bearer <key>`
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl SinkConfig {
    /// Resolves the credential from the config file or the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }
}

fn default_api_key_env() -> String {
    "HARVEST_API_KEY".to_string()
}

fn default_auth_header() -> String {
    "X-API-Key".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "./harvest.db".to_string(),
        }
    }
}

/// How the HTML page adapter finds listings and the next-page affordance
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ListingConfig {
    /// Selector matching one listing container
    pub card_selector: String,

    /// Selector matching the next-page affordance
    pub next_selector: String,

    /// Attribute of the listing container holding the source id
    pub id_attribute: String,

    /// Field name to selector, evaluated inside each listing container
    pub fields: BTreeMap<String, FieldSelector>,

    /// Fields whose absence makes a listing malformed
    pub required_fields: Vec<String>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(
            "link".to_string(),
            FieldSelector {
                selector: "a".to_string(),
                attribute: Some("href".to_string()),
            },
        );
        fields.insert(
            "address".to_string(),
            FieldSelector {
                selector: "address".to_string(),
                attribute: None,
            },
        );

        Self {
            card_selector: "article".to_string(),
            next_selector: r#"a[rel="next"]"#.to_string(),
            id_attribute: "id".to_string(),
            fields,
            required_fields: Vec::new(),
        }
    }
}

/// Selector for one listing field
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSelector {
    pub selector: String,

    /// Attribute to read; the element text is used when absent
    #[serde(default)]
    pub attribute: Option<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the harvester
    pub name: String,

    /// Version of the harvester
    pub version: String,

    /// URL with information about the operator
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "listing-harvester".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}
