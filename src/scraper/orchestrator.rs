//! Four-stage harvest orchestrator
//!
//! Stages run strictly in order, each seeding the next:
//!
//! 1. Regions: one fetch; the fan-out dimension for prices
//! 2. Categories: parents, then their subcategories
//! 3. Products: one retry-queue item per category
//! 4. Prices: one retry-queue item per product and region
//!
//! Only the first two stages can fail the run. Past that point a failing
//! item is retried, then retired, and the run carries on.

use crate::api::{ApiClient, RegionResponse, RetailBranchResponse};
use crate::config::ScraperConfig;
use crate::metrics::MetricsSink;
use crate::scraper::{
    fetch_all_pages, format_location, sleep_or_cancel, CategoryIndex, Disposition, RetryQueue,
};
use crate::storage::{NewCategory, NewPrice, NewProduct, NewStore, Storage};
use crate::{Result, ScrapeError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// Output of the categories stage
#[derive(Debug, Default)]
pub struct CategoryStage {
    pub index: CategoryIndex,
    pub write_failures: usize,
}

/// Output of the products stage
#[derive(Debug, Default)]
pub struct ProductStage {
    /// Upstream product id to internal id
    pub products: HashMap<i64, Uuid>,
    /// Upstream ids of categories whose products could not be fetched
    pub failed_categories: Vec<i64>,
    pub write_failures: usize,
}

/// One unit of work for the prices stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTarget {
    pub product_external_id: i64,
    pub product_id: Uuid,
    pub region_id: i64,
    pub region_name: String,
}

/// Output of the prices stage
#[derive(Debug, Default)]
pub struct PriceStage {
    pub prices_inserted: usize,
    /// Upstream branch id to internal store id
    pub stores: HashMap<i64, Uuid>,
    /// `(product, region)` upstream ids that could not be fetched
    pub failed_items: Vec<(i64, i64)>,
    pub write_failures: usize,
}

/// Outcome of a complete run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub regions: usize,
    pub categories: usize,
    pub products: usize,
    pub stores: usize,
    pub prices: usize,
    pub failed_categories: Vec<i64>,
    pub failed_price_items: Vec<(i64, i64)>,
    /// Entities skipped because their write failed
    pub write_failures: usize,
}

impl RunSummary {
    /// Returns true if any item or entity was given up on
    pub fn is_partial(&self) -> bool {
        !self.failed_categories.is_empty()
            || !self.failed_price_items.is_empty()
            || self.write_failures > 0
    }
}

/// Drives the harvest pipeline against one API client and one storage
pub struct Orchestrator<S: Storage> {
    api: ApiClient,
    storage: S,
    pacing: ScraperConfig,
    metrics: Arc<dyn MetricsSink>,
    span: tracing::Span,
}

impl<S: Storage> Orchestrator<S> {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `api` - Upstream client
    /// * `storage` - Persistence gateway; owned for the duration of the run
    /// * `pacing` - Page sizes and delays
    /// * `metrics` - Sink for stage durations and counts
    /// * `span` - Logging span every stage runs inside
    pub fn new(
        api: ApiClient,
        storage: S,
        pacing: ScraperConfig,
        metrics: Arc<dyn MetricsSink>,
        span: tracing::Span,
    ) -> Self {
        Self {
            api,
            storage,
            pacing,
            metrics,
            span,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Runs all four stages in order
    ///
    /// # Returns
    ///
    /// The run summary, or the error that stopped the run: a failed regions
    /// or categories stage, or cancellation.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<RunSummary> {
        let span = self.span.clone();
        async move {
            tracing::info!("Starting harvest");

            let regions = self
                .scrape_regions(cancel)
                .await
                .map_err(|e| ScrapeError::fatal("regions", e))?;

            let categories = self
                .scrape_categories(cancel)
                .await
                .map_err(|e| ScrapeError::fatal("categories", e))?;

            let products = self.scrape_products(&categories.index, cancel).await?;
            let prices = self.scrape_prices(&products.products, &regions, cancel).await?;

            let summary = RunSummary {
                regions: regions.len(),
                categories: categories.index.len(),
                products: products.products.len(),
                stores: prices.stores.len(),
                prices: prices.prices_inserted,
                failed_categories: products.failed_categories,
                failed_price_items: prices.failed_items,
                write_failures: categories.write_failures
                    + products.write_failures
                    + prices.write_failures,
            };

            tracing::info!(
                regions = summary.regions,
                categories = summary.categories,
                products = summary.products,
                stores = summary.stores,
                prices = summary.prices,
                failed_categories = summary.failed_categories.len(),
                failed_price_items = summary.failed_price_items.len(),
                write_failures = summary.write_failures,
                "Harvest complete"
            );

            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Stage 1: fetches the region list
    pub async fn scrape_regions(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<RegionResponse>> {
        let span = tracing::info_span!("stage", stage = "regions");
        async {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            let started = Instant::now();

            let regions = self.api.fetch_regions().await?;

            tracing::info!(count = regions.len(), "Fetched regions");
            self.metrics.record_duration("regions", started.elapsed(), &[]);
            self.metrics.record_count("regions", regions.len() as u64, &[]);
            Ok(regions)
        }
        .instrument(span)
        .await
    }

    /// Stage 2: fetches the category tree and upserts it parents-first
    ///
    /// A subcategory whose parent failed to persist is skipped along with it.
    pub async fn scrape_categories(&mut self, cancel: &CancellationToken) -> Result<CategoryStage> {
        let span = tracing::info_span!("stage", stage = "categories");
        async {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            let started = Instant::now();

            let tree = self.api.fetch_categories().await?;
            let mut stage = CategoryStage::default();

            for parent in &tree {
                let record = NewCategory {
                    external_id: parent.id,
                    code: parent.code.clone(),
                    name: parent.name.clone(),
                    name_english: parent.name_english.clone(),
                    parent_id: None,
                };
                let parent_id = match self.storage.upsert_category(&record) {
                    Ok(id) => id,
                    Err(e) => {
                        tracing::error!(
                            category_id = parent.id,
                            error = %e,
                            "Failed to store category"
                        );
                        stage.write_failures += 1 + parent.product_category_responses.len();
                        continue;
                    }
                };
                stage.index.insert(parent.id, &parent.name, parent_id);

                for child in &parent.product_category_responses {
                    let record = NewCategory {
                        external_id: child.id,
                        code: child.code.clone(),
                        name: child.name.clone(),
                        name_english: child.name_english.clone(),
                        parent_id: Some(parent_id),
                    };
                    match self.storage.upsert_category(&record) {
                        Ok(id) => stage.index.insert(child.id, &child.name, id),
                        Err(e) => {
                            tracing::error!(
                                category_id = child.id,
                                parent_id = parent.id,
                                error = %e,
                                "Failed to store subcategory"
                            );
                            stage.write_failures += 1;
                        }
                    }
                }
            }

            tracing::info!(count = stage.index.len(), "Stored categories");
            self.metrics.record_duration("categories", started.elapsed(), &[]);
            self.metrics.record_count("categories", stage.index.len() as u64, &[]);
            Ok(stage)
        }
        .instrument(span)
        .await
    }

    /// Stage 3: fetches and upserts the products of every category
    ///
    /// A product listed under several categories is written each time it is
    /// seen; the map keeps one entry per upstream product id.
    pub async fn scrape_products(
        &mut self,
        categories: &CategoryIndex,
        cancel: &CancellationToken,
    ) -> Result<ProductStage> {
        let span = tracing::info_span!("stage", stage = "products");
        async {
            let started = Instant::now();
            let page_size = self.pacing.product_page_size;
            let delay = Duration::from_millis(self.pacing.product_page_delay_ms);

            let mut queue: RetryQueue<(i64, Uuid)> = categories.iter().collect();
            let mut stage = ProductStage::default();

            while let Some(item) = queue.pop() {
                if cancel.is_cancelled() {
                    return Err(ScrapeError::Cancelled);
                }
                let (category_external_id, queried_id) = item.payload;

                let api = &self.api;
                let fetched = fetch_all_pages(0, delay, cancel, move |page| {
                    api.fetch_products_page(category_external_id, page, page_size)
                })
                .await;

                let listed = match fetched {
                    Ok(listed) => listed,
                    Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                    Err(e) => {
                        let retries = item.retries;
                        match queue.record_failure(item) {
                            Disposition::Requeued { attempt } => tracing::warn!(
                                category_id = category_external_id,
                                attempt,
                                error = %e,
                                "Failed to fetch products, will retry"
                            ),
                            Disposition::Retired => tracing::error!(
                                category_id = category_external_id,
                                retries,
                                error = %e,
                                "Giving up on category products"
                            ),
                        }
                        continue;
                    }
                };

                tracing::debug!(
                    category_id = category_external_id,
                    count = listed.len(),
                    "Fetched products"
                );

                for product in listed {
                    let category_id =
                        categories.resolve_category(&product.product_category_name, queried_id);
                    let record = NewProduct {
                        external_id: product.product_master_id,
                        code: product.code,
                        name: product.name,
                        name_english: product.product_category_name_english,
                        category_id,
                    };
                    match self.storage.upsert_product(&record) {
                        Ok(id) => {
                            stage.products.insert(product.product_master_id, id);
                        }
                        Err(e) => {
                            tracing::error!(
                                product_id = product.product_master_id,
                                category_id = category_external_id,
                                error = %e,
                                "Failed to store product"
                            );
                            stage.write_failures += 1;
                        }
                    }
                }
            }

            stage.failed_categories = queue.into_failed().into_iter().map(|(ext, _)| ext).collect();

            tracing::info!(
                count = stage.products.len(),
                failed = stage.failed_categories.len(),
                "Stored products"
            );
            self.metrics.record_duration("products", started.elapsed(), &[]);
            self.metrics.record_count("products", stage.products.len() as u64, &[]);
            self.metrics.record_count(
                "failed_items",
                stage.failed_categories.len() as u64,
                &[("phase", "products")],
            );
            Ok(stage)
        }
        .instrument(span)
        .await
    }

    /// Stage 4: fetches branch prices for every product in every region
    ///
    /// Each branch is upserted as a store the first time it is seen in this
    /// run; later sightings reuse the cached id.
    pub async fn scrape_prices(
        &mut self,
        products: &HashMap<i64, Uuid>,
        regions: &[RegionResponse],
        cancel: &CancellationToken,
    ) -> Result<PriceStage> {
        let span = tracing::info_span!("stage", stage = "prices");
        async {
            let started = Instant::now();
            let page_size = self.pacing.branch_page_size;
            let page_delay = Duration::from_millis(self.pacing.branch_page_delay_ms);
            let item_delay = Duration::from_millis(self.pacing.price_item_delay_ms);

            let mut queue = RetryQueue::new();
            for (&product_external_id, &product_id) in products {
                for region in regions {
                    queue.push(PriceTarget {
                        product_external_id,
                        product_id,
                        region_id: region.id,
                        region_name: region.name.clone(),
                    });
                }
            }
            tracing::info!(items = queue.len(), "Queued price lookups");

            let mut stage = PriceStage::default();

            while let Some(item) = queue.pop() {
                if cancel.is_cancelled() {
                    return Err(ScrapeError::Cancelled);
                }
                let target = &item.payload;
                let product_external_id = target.product_external_id;
                let region_id = target.region_id;

                let api = &self.api;
                let fetched = fetch_all_pages(0, page_delay, cancel, move |page| {
                    api.fetch_retail_branches_page(product_external_id, region_id, page, page_size)
                })
                .await;

                match fetched {
                    Ok(branches) => {
                        tracing::debug!(
                            product_id = product_external_id,
                            region_id,
                            count = branches.len(),
                            "Fetched branch prices"
                        );
                        for branch in &branches {
                            self.store_price(target, branch, &mut stage);
                        }
                    }
                    Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                    Err(e) => {
                        let retries = item.retries;
                        match queue.record_failure(item) {
                            Disposition::Requeued { attempt } => tracing::warn!(
                                product_id = product_external_id,
                                region_id,
                                attempt,
                                error = %e,
                                "Failed to fetch branch prices, will retry"
                            ),
                            Disposition::Retired => tracing::error!(
                                product_id = product_external_id,
                                region_id,
                                retries,
                                error = %e,
                                "Giving up on branch prices"
                            ),
                        }
                    }
                }

                sleep_or_cancel(item_delay, cancel).await?;
            }

            stage.failed_items = queue
                .into_failed()
                .into_iter()
                .map(|target| (target.product_external_id, target.region_id))
                .collect();

            tracing::info!(
                prices = stage.prices_inserted,
                stores = stage.stores.len(),
                failed = stage.failed_items.len(),
                "Stored prices"
            );
            self.metrics.record_duration("prices", started.elapsed(), &[]);
            self.metrics.record_count("prices", stage.prices_inserted as u64, &[]);
            self.metrics.record_count("stores", stage.stores.len() as u64, &[]);
            self.metrics.record_count(
                "failed_items",
                stage.failed_items.len() as u64,
                &[("phase", "prices")],
            );
            Ok(stage)
        }
        .instrument(span)
        .await
    }

    /// Resolves the branch's store and appends one price row
    fn store_price(
        &mut self,
        target: &PriceTarget,
        branch: &RetailBranchResponse,
        stage: &mut PriceStage,
    ) {
        let store_id = match stage.stores.get(&branch.id) {
            Some(&id) => id,
            None => {
                let store = NewStore {
                    external_id: branch.id,
                    name: branch.name.clone(),
                    chain: branch.company_name.clone(),
                    district: Some(target.region_name.clone()).filter(|d| !d.is_empty()),
                    location: format_location(
                        &branch.postal_address,
                        &branch.branch_latitude,
                        &branch.branch_longitude,
                    ),
                };
                match self.storage.upsert_store(&store) {
                    Ok(id) => {
                        stage.stores.insert(branch.id, id);
                        id
                    }
                    Err(e) => {
                        tracing::error!(
                            branch_id = branch.id,
                            error = %e,
                            "Failed to store branch"
                        );
                        stage.write_failures += 1;
                        return;
                    }
                }
            }
        };

        let price = NewPrice {
            product_id: target.product_id,
            store_id,
            price: branch.retailer_product_price,
        };
        match self.storage.insert_price(&price) {
            Ok(_) => stage.prices_inserted += 1,
            Err(e) => {
                tracing::error!(
                    product_id = target.product_external_id,
                    branch_id = branch.id,
                    error = %e,
                    "Failed to store price"
                );
                stage.write_failures += 1;
            }
        }
    }
}
