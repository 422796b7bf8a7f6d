//! Run metrics
//!
//! The orchestrator reports stage durations and counts through the
//! [`MetricsSink`] trait; it never reads them back. [`Collector`] buffers
//! them as line protocol and pushes the batch at process exit.

mod collector;

pub use collector::{escape_tag, format_line, Collector, FieldValue, MEASUREMENT};

use std::time::Duration;
use thiserror::Error;

/// Extra tags attached to a metric, as key/value pairs
pub type Tags<'a> = &'a [(&'a str, &'a str)];

/// Errors raised while pushing metrics
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to send metrics: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Metrics endpoint returned status {0}")]
    Status(u16),
}

/// Passive observer of run durations and counts
pub trait MetricsSink: Send + Sync {
    fn record_duration(&self, name: &str, duration: Duration, tags: Tags<'_>);

    fn record_count(&self, name: &str, count: u64, tags: Tags<'_>);
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record_duration(&self, _name: &str, _duration: Duration, _tags: Tags<'_>) {}

    fn record_count(&self, _name: &str, _count: u64, _tags: Tags<'_>) {}
}
