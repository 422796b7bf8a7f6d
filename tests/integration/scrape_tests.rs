//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to stand in for the upstream API and run the
//! orchestrator stages against an in-memory SQLite database.

use price_harvester::api::ApiClient;
use price_harvester::config::ScraperConfig;
use price_harvester::metrics::{Collector, NoopSink};
use price_harvester::scraper::MAX_RETRIES;
use price_harvester::storage::{SqliteStorage, Storage};
use price_harvester::{Orchestrator, ScrapeError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Pacing with every delay removed
fn fast_pacing() -> ScraperConfig {
    ScraperConfig {
        product_page_delay_ms: 0,
        branch_page_delay_ms: 0,
        price_item_delay_ms: 0,
        ..ScraperConfig::default()
    }
}

fn create_orchestrator(server: &MockServer) -> Orchestrator<SqliteStorage> {
    let api = ApiClient::with_client(reqwest::Client::new(), &format!("{}/api", server.uri()))
        .expect("Failed to build API client");
    Orchestrator::new(
        api,
        SqliteStorage::open_in_memory().expect("Failed to open storage"),
        fast_pacing(),
        Arc::new(NoopSink),
        tracing::Span::none(),
    )
}

fn page(content: Value, last: bool) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "content": content,
        "totalElements": 0,
        "totalPages": 1,
        "last": last,
        "first": true,
        "empty": false
    }))
}

fn product(id: i64, category_name: &str) -> Value {
    json!({
        "productMasterId": id,
        "code": format!("P{}", id),
        "name": format!("Product {}", id),
        "productCategoryName": category_name,
        "productCategoryNameEnglish": category_name
    })
}

fn branch(id: i64, price: f64) -> Value {
    json!({
        "id": id,
        "name": format!("Branch {}", id),
        "companyName": "Alpha Mega",
        "postalAddress": "Makariou 10",
        "branchLatitude": "35.17",
        "branchLongitude": "33.36",
        "retailerProductPrice": price
    })
}

async fn mount_regions(server: &MockServer, regions: Value) {
    Mock::given(method("GET"))
        .and(path("/api/fetch-regions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(regions))
        .mount(server)
        .await;
}

async fn mount_categories(server: &MockServer, tree: Value) {
    Mock::given(method("GET"))
        .and(path("/api/fetch-product-categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tree))
        .mount(server)
        .await;
}

async fn mount_products(server: &MockServer, category_id: i64, products: Value) {
    Mock::given(method("GET"))
        .and(path("/api/fetch-product-list"))
        .and(query_param("categoryIds", category_id.to_string().as_str()))
        .respond_with(page(products, true))
        .mount(server)
        .await;
}

async fn mount_branches(server: &MockServer, product_id: i64, branches: Value) {
    Mock::given(method("GET"))
        .and(path("/api/retail/fetch-retail-branch-list"))
        .and(query_param("productId", product_id.to_string().as_str()))
        .respond_with(page(branches, true))
        .mount(server)
        .await;
}

/// One region and a single top-level category with no children
async fn mount_single_category(server: &MockServer) {
    mount_regions(server, json!([{"id": 2, "name": "Lefkosia"}])).await;
    mount_categories(
        server,
        json!([{"id": 1, "code": "C1", "name": "Drinks", "productCategoryResponses": []}]),
    )
    .await;
}

#[tokio::test]
async fn test_end_to_end_identifier_maps() {
    let server = MockServer::start().await;
    mount_regions(&server, json!([{"id": 2, "name": "Lefkosia"}])).await;
    mount_categories(
        &server,
        json!([{
            "id": 1,
            "code": "C1",
            "name": "Drinks",
            "nameEnglish": "Drinks",
            "productCategoryResponses": [
                {"id": 11, "code": "C11", "name": "Juices", "nameEnglish": "Juices"}
            ]
        }]),
    )
    .await;
    mount_products(&server, 1, json!([product(500, "Drinks")])).await;
    mount_products(&server, 11, json!([])).await;
    mount_branches(&server, 500, json!([branch(900, 1.99)])).await;

    let mut orchestrator = create_orchestrator(&server);
    let cancel = CancellationToken::new();

    let regions = orchestrator.scrape_regions(&cancel).await.unwrap();
    assert_eq!(regions.len(), 1);

    let categories = orchestrator.scrape_categories(&cancel).await.unwrap();
    assert_eq!(categories.index.len(), 2);
    let uuid_a = categories.index.get(1).expect("parent category mapped");
    let uuid_b = categories.index.get(11).expect("subcategory mapped");
    assert_ne!(uuid_a, uuid_b);

    let child = orchestrator.storage().get_category(11).unwrap().unwrap();
    assert_eq!(child.id, uuid_b);
    assert_eq!(child.parent_id, Some(uuid_a));

    let products = orchestrator
        .scrape_products(&categories.index, &cancel)
        .await
        .unwrap();
    assert_eq!(products.products.len(), 1);
    let uuid_c = products.products[&500];
    assert!(products.failed_categories.is_empty());

    let stored = orchestrator.storage().get_product(500).unwrap().unwrap();
    assert_eq!(stored.id, uuid_c);
    assert_eq!(stored.category_id, uuid_a);

    let prices = orchestrator
        .scrape_prices(&products.products, &regions, &cancel)
        .await
        .unwrap();
    assert_eq!(prices.prices_inserted, 1);
    assert!(prices.failed_items.is_empty());

    let store = orchestrator.storage().get_store(900).unwrap().unwrap();
    assert_eq!(prices.stores[&900], store.id);
    assert_eq!(store.district.as_deref(), Some("Lefkosia"));

    let history = orchestrator.storage().prices_for_product(uuid_c).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].product_id, uuid_c);
    assert_eq!(history[0].store_id, store.id);
    assert!((history[0].price - 1.99).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_full_run_summary() {
    let server = MockServer::start().await;
    mount_single_category(&server).await;
    mount_products(&server, 1, json!([product(500, "Drinks"), product(501, "Drinks")])).await;
    mount_branches(&server, 500, json!([branch(900, 1.99)])).await;
    mount_branches(&server, 501, json!([branch(901, 0.85)])).await;

    let mut orchestrator = create_orchestrator(&server);
    let summary = orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.regions, 1);
    assert_eq!(summary.categories, 1);
    assert_eq!(summary.products, 2);
    assert_eq!(summary.stores, 2);
    assert_eq!(summary.prices, 2);
    assert!(!summary.is_partial());

    let counts = orchestrator.storage().count_rows().unwrap();
    assert_eq!(counts.categories, 1);
    assert_eq!(counts.products, 2);
    assert_eq!(counts.stores, 2);
    assert_eq!(counts.prices, 2);
}

#[tokio::test]
async fn test_repeated_runs_append_prices() {
    let server = MockServer::start().await;
    mount_single_category(&server).await;
    mount_products(&server, 1, json!([product(500, "Drinks")])).await;
    mount_branches(&server, 500, json!([branch(900, 1.99)])).await;

    let mut orchestrator = create_orchestrator(&server);
    let cancel = CancellationToken::new();
    orchestrator.run(&cancel).await.unwrap();
    orchestrator.run(&cancel).await.unwrap();

    let counts = orchestrator.storage().count_rows().unwrap();
    assert_eq!(counts.categories, 1);
    assert_eq!(counts.products, 1);
    assert_eq!(counts.stores, 1);
    assert_eq!(counts.prices, 2);
}

#[tokio::test]
async fn test_product_fetch_retried_then_succeeds() {
    let server = MockServer::start().await;
    mount_single_category(&server).await;

    // first three attempts fail, the fourth succeeds
    Mock::given(method("GET"))
        .and(path("/api/fetch-product-list"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(MAX_RETRIES as u64)
        .expect(MAX_RETRIES as u64)
        .mount(&server)
        .await;
    mount_products(&server, 1, json!([product(500, "Drinks")])).await;
    mount_branches(&server, 500, json!([])).await;

    let mut orchestrator = create_orchestrator(&server);
    let summary = orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.products, 1);
    assert!(summary.failed_categories.is_empty());
    assert!(orchestrator.storage().get_product(500).unwrap().is_some());
}

#[tokio::test]
async fn test_product_fetch_retired_after_budget() {
    let server = MockServer::start().await;
    mount_single_category(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/fetch-product-list"))
        .respond_with(ResponseTemplate::new(500))
        .expect(MAX_RETRIES as u64 + 1)
        .mount(&server)
        .await;

    let mut orchestrator = create_orchestrator(&server);
    let summary = orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.failed_categories, vec![1]);
    assert_eq!(summary.products, 0);
    assert!(summary.is_partial());
}

#[tokio::test]
async fn test_undecodable_branch_page_is_retired() {
    let server = MockServer::start().await;
    mount_single_category(&server).await;
    mount_products(&server, 1, json!([product(500, "Drinks")])).await;

    Mock::given(method("GET"))
        .and(path("/api/retail/fetch-retail-branch-list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(MAX_RETRIES as u64 + 1)
        .mount(&server)
        .await;

    let mut orchestrator = create_orchestrator(&server);
    let summary = orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.products, 1);
    assert_eq!(summary.failed_price_items, vec![(500, 2)]);
    assert_eq!(summary.prices, 0);
}

#[tokio::test]
async fn test_categories_failure_is_fatal() {
    let server = MockServer::start().await;
    mount_regions(&server, json!([{"id": 2, "name": "Lefkosia"}])).await;

    Mock::given(method("GET"))
        .and(path("/api/fetch-product-categories"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/fetch-product-list"))
        .respond_with(page(json!([]), true))
        .expect(0)
        .mount(&server)
        .await;

    let mut orchestrator = create_orchestrator(&server);
    let err = orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScrapeError::FatalStage {
            stage: "categories",
            ..
        }
    ));
}

#[tokio::test]
async fn test_regions_failure_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/fetch-regions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/fetch-product-categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let mut orchestrator = create_orchestrator(&server);
    let err = orchestrator
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ScrapeError::FatalStage { stage: "regions", .. }));
}

#[tokio::test]
async fn test_product_category_resolved_by_name() {
    let server = MockServer::start().await;
    mount_regions(&server, json!([])).await;
    mount_categories(
        &server,
        json!([
            {"id": 1, "name": "Drinks", "productCategoryResponses": []},
            {"id": 2, "name": "Dairy", "productCategoryResponses": []}
        ]),
    )
    .await;
    mount_products(
        &server,
        1,
        json!([product(500, "Dairy"), product(501, "Unlisted")]),
    )
    .await;
    mount_products(&server, 2, json!([])).await;

    let mut orchestrator = create_orchestrator(&server);
    let cancel = CancellationToken::new();
    let categories = orchestrator.scrape_categories(&cancel).await.unwrap();
    orchestrator
        .scrape_products(&categories.index, &cancel)
        .await
        .unwrap();

    let drinks = categories.index.get(1).unwrap();
    let dairy = categories.index.get(2).unwrap();

    let listed_as_dairy = orchestrator.storage().get_product(500).unwrap().unwrap();
    assert_eq!(listed_as_dairy.category_id, dairy);

    let unlisted = orchestrator.storage().get_product(501).unwrap().unwrap();
    assert_eq!(unlisted.category_id, drinks);
}

#[tokio::test]
async fn test_product_pages_followed_until_last() {
    let server = MockServer::start().await;
    mount_single_category(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/fetch-product-list"))
        .and(query_param("page", "0"))
        .respond_with(page(json!([product(500, "Drinks"), product(501, "Drinks")]), false))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/fetch-product-list"))
        .and(query_param("page", "1"))
        .respond_with(page(json!([product(502, "Drinks")]), true))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/fetch-product-list"))
        .and(query_param("page", "2"))
        .respond_with(page(json!([product(503, "Drinks")]), true))
        .expect(0)
        .mount(&server)
        .await;

    let mut orchestrator = create_orchestrator(&server);
    let cancel = CancellationToken::new();
    let categories = orchestrator.scrape_categories(&cancel).await.unwrap();
    let products = orchestrator
        .scrape_products(&categories.index, &cancel)
        .await
        .unwrap();

    assert_eq!(products.products.len(), 3);
    for id in [500, 501, 502] {
        assert!(products.products.contains_key(&id), "missing product {}", id);
    }
}

#[tokio::test]
async fn test_branch_seen_twice_is_upserted_once() {
    let server = MockServer::start().await;
    mount_single_category(&server).await;
    mount_products(&server, 1, json!([product(500, "Drinks"), product(501, "Drinks")])).await;
    mount_branches(&server, 500, json!([branch(900, 1.99)])).await;
    mount_branches(&server, 501, json!([branch(900, 3.49)])).await;

    let mut orchestrator = create_orchestrator(&server);
    let summary = orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.stores, 1);
    assert_eq!(summary.prices, 2);

    let store = orchestrator.storage().get_store(900).unwrap().unwrap();
    let product = orchestrator.storage().get_product(501).unwrap().unwrap();
    let history = orchestrator.storage().prices_for_product(product.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].store_id, store.id);
}

#[tokio::test]
async fn test_prices_fan_out_per_region() {
    let server = MockServer::start().await;
    mount_regions(
        &server,
        json!([{"id": 2, "name": "Lefkosia"}, {"id": 3, "name": "Lemesos"}]),
    )
    .await;
    mount_categories(&server, json!([{"id": 1, "name": "Drinks"}])).await;
    mount_products(&server, 1, json!([product(500, "Drinks")])).await;

    for (region, branch_id) in [(2, 900), (3, 910)] {
        Mock::given(method("GET"))
            .and(path("/api/retail/fetch-retail-branch-list"))
            .and(query_param("productId", "500"))
            .and(query_param("regionIds", region.to_string().as_str()))
            .respond_with(page(json!([branch(branch_id, 1.0)]), true))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut orchestrator = create_orchestrator(&server);
    let summary = orchestrator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.prices, 2);
    let lemesos = orchestrator.storage().get_store(910).unwrap().unwrap();
    assert_eq!(lemesos.district.as_deref(), Some("Lemesos"));
}

#[tokio::test]
async fn test_cancellation_stops_run() {
    let server = MockServer::start().await;
    mount_single_category(&server).await;
    mount_products(&server, 1, json!([product(500, "Drinks")])).await;

    Mock::given(method("GET"))
        .and(path("/api/retail/fetch-retail-branch-list"))
        .respond_with(page(json!([branch(900, 1.0)]), true).set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let api = ApiClient::with_client(reqwest::Client::new(), &format!("{}/api", server.uri()))
        .unwrap();
    let mut orchestrator = Orchestrator::new(
        api,
        SqliteStorage::open_in_memory().unwrap(),
        ScraperConfig {
            price_item_delay_ms: 60_000,
            ..fast_pacing()
        },
        Arc::new(NoopSink),
        tracing::Span::none(),
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(10), orchestrator.run(&cancel))
        .await
        .expect("run should stop promptly once cancelled")
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_stage_metrics_recorded() {
    let server = MockServer::start().await;
    mount_single_category(&server).await;
    mount_products(&server, 1, json!([product(500, "Drinks")])).await;
    mount_branches(&server, 500, json!([branch(900, 1.99)])).await;

    let collector = Arc::new(Collector::new(
        Some("http://127.0.0.1:9/write".to_string()),
        Duration::from_secs(1),
    )
    .unwrap());
    let api = ApiClient::with_client(reqwest::Client::new(), &format!("{}/api", server.uri()))
        .unwrap();
    let mut orchestrator = Orchestrator::new(
        api,
        SqliteStorage::open_in_memory().unwrap(),
        fast_pacing(),
        collector.clone(),
        tracing::Span::none(),
    );
    orchestrator.run(&CancellationToken::new()).await.unwrap();

    let lines = collector.lines();
    let has = |prefix: &str| lines.iter().any(|line| line.starts_with(prefix));
    assert!(has("scraper,metric=regions duration_ms="));
    assert!(has("scraper,metric=categories count=1i "));
    assert!(has("scraper,metric=products count=1i "));
    assert!(has("scraper,metric=prices count=1i "));
    assert!(has("scraper,metric=stores count=1i "));
    assert!(has("scraper,metric=failed_items,phase=prices count=0i "));
}
