use crate::config::types::{
    Config, HydrationConfig, ListingConfig, QuotaConfig, SinkConfig, StabilizationConfig,
    StoreConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_stabilization(&config.stabilization)?;
    validate_hydration(&config.hydration)?;
    validate_quota(&config.quota)?;
    validate_sink(&config.sink)?;
    validate_store(&config.store)?;
    validate_listing(&config.listing)?;

    if config.pagination.default_max_pages < 1 {
        return Err(ConfigError::Validation(
            "default_max_pages must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_stabilization(config: &StabilizationConfig) -> Result<(), ConfigError> {
    if config.sample_interval_ms < 1 {
        return Err(ConfigError::Validation(
            "sample_interval_ms must be >= 1".to_string(),
        ));
    }

    if config.stability_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "stability_threshold must be >= 1, got {}",
            config.stability_threshold
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

fn validate_hydration(config: &HydrationConfig) -> Result<(), ConfigError> {
    if config.scroll_step < 1 {
        return Err(ConfigError::Validation(
            "scroll_step must be >= 1 pixel".to_string(),
        ));
    }

    if config.max_steps < 1 {
        return Err(ConfigError::Validation(format!(
            "hydration max_steps must be >= 1, got {}",
            config.max_steps
        )));
    }

    if config.load_more_labels.iter().any(|l| l.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "load_more_labels cannot contain empty labels".to_string(),
        ));
    }

    Ok(())
}

fn validate_quota(config: &QuotaConfig) -> Result<(), ConfigError> {
    if config.restricted_limit < 1 {
        return Err(ConfigError::Validation(
            "restricted_limit must be >= 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_sink(config: &SinkConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid sink endpoint: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Sink endpoint must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.auth_header.trim().is_empty() {
        return Err(ConfigError::Validation(
            "auth_header cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_store(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_listing(config: &ListingConfig) -> Result<(), ConfigError> {
    validate_selector(&config.card_selector)?;
    validate_selector(&config.next_selector)?;

    for (name, field) in &config.fields {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "listing field names cannot be empty".to_string(),
            ));
        }
        validate_selector(&field.selector)?;
    }

    for required in &config.required_fields {
        let known = config.fields.contains_key(required) || required == "id";
        if !known {
            return Err(ConfigError::Validation(format!(
                "required field '{}' has no selector",
                required
            )));
        }
    }

    Ok(())
}

/// Validates that a CSS selector is non-empty and parses
fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(
            "selector cannot be empty".to_string(),
        ));
    }

    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}
