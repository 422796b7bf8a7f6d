//! Price-Harvester main entry point
//!
//! This is the command-line interface for the Price-Harvester price collector.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use price_harvester::api::ApiClient;
use price_harvester::config::{load_config, Config};
use price_harvester::metrics::{Collector, MetricsSink};
use price_harvester::shutdown::spawn_signal_watcher;
use price_harvester::storage::{open_storage, Storage};
use price_harvester::{health, Orchestrator, RunSummary, ScrapeError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Push timeout used when the config leaves it unset
const DEFAULT_METRICS_TIMEOUT_SECS: u64 = 10;

/// Price-Harvester: a polite retail price collector
///
/// Harvests regions, categories, products, and per-branch prices from the
/// upstream price-comparison API and appends them to the price history.
/// The database is named by `DATABASE_URL`; `METRICS_URL` and `PORT` are
/// optional.
#[derive(Parser, Debug)]
#[command(name = "price-harvester")]
#[command(version)]
#[command(about = "A polite retail price collector", long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    /// Show row counts from the database and exit
    #[arg(long)]
    stats: bool,

    /// Do not start the health server
    #[arg(long)]
    no_health: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet, cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Harvest failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    tracing::debug!(api = %config.api.base_url, "Configuration loaded");

    if cli.stats {
        return handle_stats(&config);
    }

    handle_harvest(config, !cli.no_health).await
}

/// Sets up the logging/tracing subscriber
///
/// `RUST_LOG` takes precedence over the verbosity flags when set.
fn setup_logging(verbose: u8, quiet: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("price_harvester=info,warn"),
                1 => EnvFilter::new("price_harvester=debug,info"),
                2 => EnvFilter::new("price_harvester=trace,debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false);

    match format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Pretty => builder.with_target(false).init(),
    }
}

/// Handles the --stats mode: prints row counts from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let url = database_url(config)?;
    let storage = open_storage(url).context("Failed to open database")?;
    let counts = storage.count_rows()?;

    println!("=== Price-Harvester Statistics ===\n");
    println!("  Categories: {}", counts.categories);
    println!("  Products:   {}", counts.products);
    println!("  Stores:     {}", counts.stores);
    println!("  Prices:     {}", counts.prices);

    Ok(())
}

/// Handles the main harvest: runs the pipeline and pushes metrics
async fn handle_harvest(config: Config, health_enabled: bool) -> anyhow::Result<()> {
    let timeout = config.metrics.timeout_secs.unwrap_or(DEFAULT_METRICS_TIMEOUT_SECS);
    let metrics = Arc::new(
        Collector::new(config.metrics.url.clone(), Duration::from_secs(timeout))
            .context("Failed to build metrics client")?,
    );
    if !metrics.is_enabled() {
        tracing::info!("METRICS_URL not set, metrics disabled");
    }

    let cancel = CancellationToken::new();
    spawn_signal_watcher(cancel.clone(), metrics.clone());

    let health = (health_enabled && config.health.enabled)
        .then(|| health::spawn(config.health.port, cancel.child_token()));

    let result = harvest(&config, metrics.clone(), &cancel).await;

    match &result {
        Ok(summary) => {
            let status = if summary.is_partial() { "partial" } else { "success" };
            metrics.record_count("runs", 1, &[("status", status)]);
        }
        Err(e) => {
            metrics.record_count("errors", 1, &[("phase", failure_phase(e))]);
        }
    }

    match metrics.flush().await {
        Ok(sent) if sent > 0 => tracing::debug!(lines = sent, "Metrics pushed"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to push metrics"),
    }

    cancel.cancel();
    if let Some(handle) = health {
        let _ = handle.await;
    }

    result.map(|_| ()).context("Harvest did not complete")
}

/// Opens the database and API client, then runs every stage
async fn harvest(
    config: &Config,
    metrics: Arc<Collector>,
    cancel: &CancellationToken,
) -> Result<RunSummary, ScrapeError> {
    let storage = open_storage(database_url(config)?)?;
    let api = ApiClient::new(&config.api)?;

    let span = tracing::info_span!("harvest", run_id = %uuid::Uuid::new_v4());
    let mut orchestrator = Orchestrator::new(api, storage, config.scraper.clone(), metrics, span);

    orchestrator.run(cancel).await
}

fn database_url(config: &Config) -> Result<&str, price_harvester::ConfigError> {
    config
        .database
        .url
        .as_deref()
        .ok_or(price_harvester::ConfigError::MissingDatabaseUrl)
}

/// Metric tag naming where a failed run stopped
fn failure_phase(error: &ScrapeError) -> &'static str {
    match error {
        ScrapeError::Cancelled => "interrupted",
        ScrapeError::FatalStage { stage, .. } => *stage,
        _ => "init",
    }
}
