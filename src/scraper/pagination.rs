//! Page-by-page fetching of paginated endpoints

use crate::api::Page;
use crate::scraper::sleep_or_cancel;
use crate::{ApiResult, ScrapeError};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fetches every page of a paginated endpoint and concatenates the content
///
/// Pages are requested in order starting at `start_page`. Fetching stops at
/// the first page flagged `last` or carrying no items, whichever comes first.
/// The token is checked before every request, and `delay` is slept between
/// consecutive pages.
///
/// # Arguments
///
/// * `start_page` - First page index to request (the upstream is 0-indexed)
/// * `delay` - Pause between consecutive page requests
/// * `cancel` - Token observed before each fetch and during the delay
/// * `fetch_page` - Fetches one page by index
///
/// # Returns
///
/// All items in page order, or the first error. A failed page is never
/// retried here; retry is the caller's concern.
pub async fn fetch_all_pages<T, F, Fut>(
    start_page: u32,
    delay: Duration,
    cancel: &CancellationToken,
    mut fetch_page: F,
) -> Result<Vec<T>, ScrapeError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ApiResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut page = start_page;

    loop {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        let batch = fetch_page(page).await?;
        let received = batch.content.len();
        let last = batch.last;
        items.extend(batch.content);

        tracing::trace!(page, received, last, "fetched page");

        if last || received == 0 {
            break;
        }

        page += 1;
        sleep_or_cancel(delay, cancel).await?;
    }

    Ok(items)
}
