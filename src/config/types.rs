use serde::Deserialize;

/// Default upstream API root
pub const DEFAULT_API_BASE_URL: &str = "https://www.e-kalathi.gov.cy/ekalathi-website-server/api/";

/// Default Referer header sent with every upstream request
pub const DEFAULT_REFERER: &str = "https://www.e-kalathi.gov.cy/";

/// Main configuration structure for Price-Harvester
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub scraper: ScraperConfig,
    pub metrics: MetricsConfig,
    pub health: HealthConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DatabaseConfig {
    /// Connection string: a file path, `sqlite://<path>`, or `:memory:`
    pub url: Option<String>,
}

/// Upstream API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApiConfig {
    /// Root URL all endpoint paths are joined onto
    pub base_url: String,

    /// User-Agent header value
    pub user_agent: String,

    /// Referer header value
    pub referer: String,

    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: format!("price-harvester/{}", env!("CARGO_PKG_VERSION")),
            referer: DEFAULT_REFERER.to_string(),
            timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

/// Scrape pacing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScraperConfig {
    /// Products requested per page
    pub product_page_size: u32,

    /// Retail branches requested per page
    pub branch_page_size: u32,

    /// Delay between successive product pages (milliseconds)
    pub product_page_delay_ms: u64,

    /// Delay between successive branch pages (milliseconds)
    pub branch_page_delay_ms: u64,

    /// Delay after each product x region work item (milliseconds)
    pub price_item_delay_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            product_page_size: 20,
            branch_page_size: 10,
            product_page_delay_ms: 100,
            branch_page_delay_ms: 100,
            price_item_delay_ms: 200,
        }
    }
}

/// Metrics push configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MetricsConfig {
    /// Line-protocol endpoint; metrics are disabled when unset
    pub url: Option<String>,

    /// Timeout for the final push (seconds)
    pub timeout_secs: Option<u64>,
}

/// Health responder configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HealthConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}
