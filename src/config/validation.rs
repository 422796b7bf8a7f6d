use crate::config::types::{ApiConfig, Config, DatabaseConfig, MetricsConfig, ScraperConfig};
use crate::ConfigError;
use reqwest::header::HeaderValue;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_database_config(&config.database)?;
    validate_api_config(&config.api)?;
    validate_scraper_config(&config.scraper)?;
    validate_metrics_config(&config.metrics)?;
    Ok(())
}

/// Validates database configuration
fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    match config.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(()),
        _ => Err(ConfigError::MissingDatabaseUrl),
    }
}

/// Validates upstream API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "api base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api user-agent cannot be empty".to_string(),
        ));
    }

    if config.referer.trim().is_empty() || HeaderValue::from_str(&config.referer).is_err() {
        return Err(ConfigError::Validation(format!(
            "api referer is not a valid header value: {:?}",
            config.referer
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "api timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates scrape pacing configuration
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.product_page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "product-page-size must be >= 1, got {}",
            config.product_page_size
        )));
    }

    if config.branch_page_size < 1 {
        return Err(ConfigError::Validation(format!(
            "branch-page-size must be >= 1, got {}",
            config.branch_page_size
        )));
    }

    Ok(())
}

/// Validates metrics configuration
fn validate_metrics_config(config: &MetricsConfig) -> Result<(), ConfigError> {
    if let Some(url) = &config.url {
        Url::parse(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid metrics url '{}': {}", url, e)))?;
    }

    Ok(())
}
