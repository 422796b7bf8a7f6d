//! Scraper module for the harvest pipeline
//!
//! This module contains the core scraping logic, including:
//! - Page-by-page fetching of paginated endpoints
//! - A bounded-retry FIFO work queue
//! - Product category and store location resolution
//! - The four-stage orchestrator (regions, categories, products, prices)

mod orchestrator;
mod pagination;
mod resolve;
mod retry_queue;

pub use orchestrator::{
    CategoryStage, Orchestrator, PriceStage, PriceTarget, ProductStage, RunSummary,
};
pub use pagination::fetch_all_pages;
pub use resolve::{format_location, CategoryIndex};
pub use retry_queue::{Disposition, RetryQueue, WorkItem, MAX_RETRIES};

use crate::ScrapeError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleeps for `delay`, waking early with [`ScrapeError::Cancelled`] if the
/// token fires first
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> crate::Result<()> {
    if cancel.is_cancelled() {
        return Err(ScrapeError::Cancelled);
    }
    if delay.is_zero() {
        return Ok(());
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_completes() {
        let cancel = CancellationToken::new();
        assert!(sleep_or_cancel(Duration::from_millis(5), &cancel).await.is_ok());
    }

    #[tokio::test]
    async fn test_sleep_interrupted_by_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = sleep_or_cancel(Duration::from_secs(30), &cancel).await;
        assert!(result.unwrap_err().is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_sleep() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = sleep_or_cancel(Duration::ZERO, &cancel).await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
