//! Configuration module for Price-Harvester
//!
//! Settings come from an optional TOML file, then the process environment
//! (`DATABASE_URL`, `METRICS_URL`, `PORT`, `SCRAPER_API_BASE_URL`) overrides
//! whatever the file said. Every section has defaults, so an environment with
//! only `DATABASE_URL` set is a complete configuration.
//!
//! # Example
//!
//! ```no_run
//! use price_harvester::config::load_config;
//!
//! let config = load_config(None).unwrap();
//! println!("Product page size: {}", config.scraper.product_page_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, Config, DatabaseConfig, HealthConfig, MetricsConfig, ScraperConfig,
    DEFAULT_API_BASE_URL, DEFAULT_REFERER,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, load_config, load_config_from, parse_config, ENV_API_BASE_URL,
    ENV_DATABASE_URL, ENV_METRICS_URL, ENV_PORT,
};
pub use validation::validate;
