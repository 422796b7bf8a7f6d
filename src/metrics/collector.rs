//! Line-protocol metrics collector
//!
//! Metrics are buffered for the whole run and pushed once at exit, as
//! InfluxDB line protocol:
//!
//! ```text
//! scraper,metric=products,phase=products count=1234i 1700000000000000000
//! ```

use crate::metrics::{MetricsError, MetricsSink, Tags};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Measurement name every line is written under
pub const MEASUREMENT: &str = "scraper";

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
}

impl FieldValue {
    fn render(&self) -> String {
        match self {
            Self::Int(v) => format!("{}i", v),
            Self::Float(v) => format!("{:.6}", v),
        }
    }
}

/// Buffers metric lines and pushes them to a line-protocol endpoint
///
/// A collector without a URL is disabled: it records nothing and flushing is
/// a no-op.
pub struct Collector {
    url: Option<String>,
    client: reqwest::Client,
    started: Instant,
    lines: Mutex<Vec<String>>,
}

impl Collector {
    /// Creates a collector pushing to `url`, or a disabled one when `None`
    ///
    /// `timeout` bounds the whole push request.
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, MetricsError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url: url.filter(|u| !u.trim().is_empty()),
            client,
            started: Instant::now(),
            lines: Mutex::new(Vec::new()),
        })
    }

    /// Returns true if metrics are being recorded
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    /// Returns a copy of the buffered lines
    pub fn lines(&self) -> Vec<String> {
        self.buffer().clone()
    }

    /// Time since the collector was created
    pub fn total_duration(&self) -> Duration {
        self.started.elapsed()
    }

    /// Adds one line to the buffer
    pub fn record(&self, tags: &BTreeMap<String, String>, fields: &[(&str, FieldValue)]) {
        if !self.is_enabled() {
            return;
        }
        let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let line = format_line(MEASUREMENT, tags, fields, timestamp);
        self.buffer().push(line);
    }

    /// Pushes all buffered lines, appending a `run_duration` line
    ///
    /// The buffer is cleared only after the endpoint accepts the batch.
    pub async fn flush(&self) -> Result<usize, MetricsError> {
        let Some(url) = &self.url else {
            return Ok(0);
        };
        if self.buffer().is_empty() {
            return Ok(0);
        }

        self.record_duration("run_duration", self.total_duration(), &[]);
        let body = self.buffer().join("\n");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(MetricsError::Status(status.as_u16()));
        }

        let mut lines = self.buffer();
        let sent = lines.len();
        lines.clear();
        Ok(sent)
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<String>> {
        // A poisoned buffer still holds valid lines
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MetricsSink for Collector {
    fn record_duration(&self, name: &str, duration: Duration, tags: Tags<'_>) {
        self.record(
            &merge_tags(tags, name),
            &[("duration_ms", FieldValue::Int(duration.as_millis() as i64))],
        );
    }

    fn record_count(&self, name: &str, count: u64, tags: Tags<'_>) {
        self.record(
            &merge_tags(tags, name),
            &[("count", FieldValue::Int(count as i64))],
        );
    }
}

/// Formats one line-protocol line
pub fn format_line(
    measurement: &str,
    tags: &BTreeMap<String, String>,
    fields: &[(&str, FieldValue)],
    timestamp_ns: i64,
) -> String {
    let mut line = String::from(measurement);
    for (key, value) in tags {
        line.push(',');
        line.push_str(key);
        line.push('=');
        line.push_str(&escape_tag(value));
    }

    line.push(' ');
    let fields: Vec<String> = fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value.render()))
        .collect();
    line.push_str(&fields.join(","));

    line.push(' ');
    line.push_str(&timestamp_ns.to_string());
    line
}

/// Escapes spaces, commas, and equals signs in a tag value
pub fn escape_tag(value: &str) -> String {
    value
        .replace(' ', "\\ ")
        .replace(',', "\\,")
        .replace('=', "\\=")
}

/// Caller tags plus the `metric` tag; `metric` wins on collision
fn merge_tags(tags: Tags<'_>, name: &str) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = tags
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    merged.insert("metric".to_string(), name.to_string());
    merged
}
