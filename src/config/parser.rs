use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Environment variables that override file settings
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_METRICS_URL: &str = "METRICS_URL";
pub const ENV_PORT: &str = "PORT";
pub const ENV_API_BASE_URL: &str = "SCRAPER_API_BASE_URL";

/// Loads configuration from an optional TOML file plus the process environment
///
/// # Arguments
///
/// * `path` - Optional path to a TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let env: HashMap<String, String> = std::env::vars().collect();
    load_config_from(path, &env)
}

/// Loads configuration using an explicit environment map
///
/// Split out from [`load_config`] so tests never touch the real environment.
pub fn load_config_from(
    path: Option<&Path>,
    env: &HashMap<String, String>,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    apply_env_overrides(&mut config, env)?;
    validate(&config)?;

    Ok(config)
}

/// Parses TOML content into a configuration without validating it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Applies environment overrides on top of file settings
///
/// Empty values are treated as unset.
pub fn apply_env_overrides(
    config: &mut Config,
    env: &HashMap<String, String>,
) -> Result<(), ConfigError> {
    let get = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

    if let Some(url) = get(ENV_DATABASE_URL) {
        config.database.url = Some(url.to_string());
    }

    if let Some(url) = get(ENV_METRICS_URL) {
        config.metrics.url = Some(url.to_string());
    }

    if let Some(base) = get(ENV_API_BASE_URL) {
        config.api.base_url = base.to_string();
    }

    if let Some(port) = get(ENV_PORT) {
        config.health.port = port.parse().map_err(|_| {
            ConfigError::Validation(format!("PORT must be a port number, got '{}'", port))
        })?;
    }

    Ok(())
}
