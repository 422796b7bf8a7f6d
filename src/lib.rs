//! Price-Harvester: a polite retail price collector
//!
//! This crate harvests regions, categories, products, and per-branch retail
//! prices from a public price-comparison API and stores them in SQLite,
//! building an append-only price history across runs.

pub mod api;
pub mod config;
pub mod health;
pub mod metrics;
pub mod scraper;
pub mod shutdown;
pub mod storage;

use thiserror::Error;

/// Main error type for Price-Harvester operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("{stage} stage failed: {source}")]
    FatalStage {
        stage: &'static str,
        #[source]
        source: Box<ScrapeError>,
    },

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Wraps an error as the failure of a prerequisite stage
    pub fn fatal(stage: &'static str, source: impl Into<ScrapeError>) -> Self {
        let source = source.into();
        // Cancellation stays recognisable no matter where it surfaced
        if matches!(source, ScrapeError::Cancelled) {
            return source;
        }
        ScrapeError::FatalStage {
            stage,
            source: Box::new(source),
        }
    }

    /// Returns true if this error was caused by the cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScrapeError::Cancelled)
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("DATABASE_URL is required")]
    MissingDatabaseUrl,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Upstream API errors
///
/// Transport, status, and decode failures are one retryable class as far as
/// the orchestrator is concerned; the variants only sharpen the log line.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode response from {url} (body length: {body_len}): {source}")]
    Decode {
        url: String,
        body_len: usize,
        source: serde_json::Error,
    },

    #[error("Invalid {name} header value: {value:?}")]
    InvalidHeader { name: &'static str, value: String },

    #[error("Invalid request URL: {0}")]
    Url(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type alias for Price-Harvester operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

// Re-export commonly used types
pub use config::Config;
pub use scraper::{Orchestrator, RunSummary};
pub use storage::{SqliteStorage, Storage};
