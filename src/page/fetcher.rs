//! HTTP fetcher for listing pages
//!
//! This module handles the page downloads performed by the command-line host:
//! - Building HTTP clients with a proper user agent string
//! - GET requests for listing pages
//! - Classifying non-success responses as errors

use crate::config::UserAgentConfig;
use crate::HarvestError;
use reqwest::Client;
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use listing_harvester::config::UserAgentConfig;
/// use listing_harvester::page::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: Name/Version (+ContactURL)
    let user_agent = match &config.contact_url {
        Some(contact) => format!("{}/{} (+{})", config.name, config.version, contact),
        None => format!("{}/{}", config.name, config.version),
    };

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a listing page and returns its body
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The page to fetch
///
/// # Returns
///
/// * `Ok((String, String))` - Final URL after redirects and the page body
/// * `Err(HarvestError)` - Network failure or non-success status
pub async fn fetch_page(client: &Client, url: &str) -> Result<(String, String), HarvestError> {
    tracing::debug!("Fetching listing page: {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|source| HarvestError::Http {
            url: url.to_string(),
            source,
        })?;

    let final_url = response.url().to_string();
    let body = response.text().await.map_err(|source| HarvestError::Http {
        url: url.to_string(),
        source,
    })?;

    Ok((final_url, body))
}
