//! Integration tests for the category crawler
//!
//! These tests use wiremock to stand in for the browse endpoint and drive
//! one category crawl at a time through every stop condition.

use crate::common::{
    browse_requests, create_test_config, empty_page, numbered_page, CatalogResponder, PRODUCT_PATH,
};
use pantry_harvest::catalog::CategoryDescriptor;
use pantry_harvest::config::Config;
use pantry_harvest::crawler::{build_http_client, CategoryCrawler};
use pantry_harvest::CrawlOutcome;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn breakfast() -> CategoryDescriptor {
    CategoryDescriptor {
        id: "1_5".to_string(),
        name: "Breakfast".to_string(),
        parent_id: "1_1".to_string(),
        level: Some(2),
        url_key: "pantry/breakfast".to_string(),
    }
}

fn crawler(config: Config, test_run: bool) -> CategoryCrawler {
    let client = build_http_client(&config.user_agent).expect("Failed to build client");
    CategoryCrawler::new(client, Arc::new(config), test_run)
}

async fn mount_catalog(server: &MockServer, responder: CatalogResponder) {
    Mock::given(method("POST"))
        .and(path(PRODUCT_PATH))
        .respond_with(responder)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_stops_at_last_page_from_total() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // 100 products at 36 per page is 3 pages
    let responder = CatalogResponder::new(numbered_page(9000, 36, Some(100)))
        .page("1_5", 1, numbered_page(1000, 36, Some(100)))
        .page("1_5", 2, numbered_page(2000, 36, Some(100)))
        .page("1_5", 3, numbered_page(3000, 36, Some(100)));
    mount_catalog(&server, responder).await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::Done);
    assert_eq!(result.rows.len(), 108);
    assert_eq!(result.pages_fetched, 3);

    let pages: Vec<u64> = browse_requests(&server).await.into_iter().map(|(_, p)| p).collect();
    assert_eq!(pages, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_rows_carry_category_and_product_fields() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(
        &server,
        CatalogResponder::new(empty_page()).page("1_5", 1, numbered_page(1, 2, Some(2))),
    )
    .await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::Done);
    assert_eq!(result.rows.len(), 2);

    let row = &result.rows[0];
    assert_eq!(row.stockcode.as_deref(), Some("1"));
    assert_eq!(row.name.as_deref(), Some("Product 1"));
    assert_eq!(row.price, Some(2.5));
    assert_eq!(
        row.url,
        Some(format!("{}/shop/productdetails/1/product-1", server.uri()))
    );
    assert_eq!(row.category_id.as_deref(), Some("1_5"));
    assert_eq!(row.category_name.as_deref(), Some("Breakfast"));
    assert_eq!(row.category_parent_id.as_deref(), Some("1_1"));
    assert_eq!(row.category_level, Some(2));
    assert_eq!(row.nutrition["Nutr_Protein_per_100g"], "5");
    assert_eq!(row.nutrition["Nutr_Sugars_per_100g"], "1");
}

#[tokio::test]
async fn test_request_carries_browse_payload_and_headers() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let referer = format!("{}/shop/browse/pantry/breakfast", server.uri());

    Mock::given(method("POST"))
        .and(path(PRODUCT_PATH))
        .and(header("referer", referer.as_str()))
        .and(header("origin", server.uri().as_str()))
        .and(header("user-agent", "TestHarvester/1.0"))
        .and(body_partial_json(json!({
            "categoryId": "1_5",
            "pageNumber": 1,
            "pageSize": 36,
            "location": "/shop/browse/pantry/breakfast"
        })))
        .respond_with(numbered_page(1, 1, Some(1)))
        .mount(&server)
        .await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    // Any mismatch falls through to wiremock's 404, which fails the category
    assert_eq!(result.outcome, CrawlOutcome::Done);
    assert_eq!(result.rows.len(), 1);
}

#[tokio::test]
async fn test_test_run_page_limit_is_safety_stop() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // No total hint, and every page is fresh
    let mut responder = CatalogResponder::new(empty_page());
    for page in 1..=8 {
        responder = responder.page("1_5", page, numbered_page(page * 100, 3, None));
    }
    mount_catalog(&server, responder).await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), true)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::SafetyStopped);
    assert_eq!(result.rows.len(), 15);
    assert_eq!(browse_requests(&server).await.len(), 5);
}

#[tokio::test]
async fn test_full_run_page_cap_is_safety_stop() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let mut responder = CatalogResponder::new(empty_page());
    for page in 1..=4 {
        responder = responder.page("1_5", page, numbered_page(page * 100, 2, Some(1000)));
    }
    mount_catalog(&server, responder).await;

    let mut config = create_test_config(&server.uri(), dir.path());
    config.crawler.max_pages_per_category = 2;

    let result = crawler(config, false).crawl_category(breakfast()).await;

    assert_eq!(result.outcome, CrawlOutcome::SafetyStopped);
    assert_eq!(result.rows.len(), 4);
    assert_eq!(browse_requests(&server).await.len(), 2);
}

#[tokio::test]
async fn test_repeated_page_stops_category() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // The endpoint keeps serving page 1 for every page number
    mount_catalog(&server, CatalogResponder::new(numbered_page(1, 3, None))).await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::Done);
    assert_eq!(result.rows.len(), 3);
    assert_eq!(browse_requests(&server).await.len(), 2);
}

#[tokio::test]
async fn test_empty_page_ends_category() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let responder = CatalogResponder::new(empty_page())
        .page("1_5", 1, numbered_page(100, 36, None))
        .page("1_5", 2, numbered_page(200, 36, None));
    mount_catalog(&server, responder).await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::Done);
    assert_eq!(result.rows.len(), 72);
    assert_eq!(result.pages_fetched, 3);
    assert_eq!(browse_requests(&server).await.len(), 3);
}

#[tokio::test]
async fn test_missing_bundles_is_empty_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_catalog(
        &server,
        CatalogResponder::new(ResponseTemplate::new(200).set_body_json(json!({"Bundles": null}))),
    )
    .await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::Done);
    assert!(result.rows.is_empty());
}

#[tokio::test]
async fn test_transient_error_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Mounted first, so it answers the first request only
    Mock::given(method("POST"))
        .and(path(PRODUCT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_catalog(
        &server,
        CatalogResponder::new(empty_page()).page("1_5", 1, numbered_page(1, 5, Some(5))),
    )
    .await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::Done);
    assert_eq!(result.rows.len(), 5);

    let pages: Vec<u64> = browse_requests(&server).await.into_iter().map(|(_, p)| p).collect();
    assert_eq!(pages, vec![1, 1]);
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(PRODUCT_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_catalog(
        &server,
        CatalogResponder::new(empty_page()).page("1_5", 1, numbered_page(1, 2, Some(2))),
    )
    .await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::Done);
    assert_eq!(result.rows.len(), 2);
    assert_eq!(browse_requests(&server).await.len(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_keep_partial_rows() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let responder = CatalogResponder::new(ResponseTemplate::new(503))
        .page("1_5", 1, numbered_page(100, 36, Some(100)));
    mount_catalog(&server, responder).await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::Failed);
    assert_eq!(result.rows.len(), 36);

    // Page 1 once, then page 2 for every allowed attempt
    let pages: Vec<u64> = browse_requests(&server).await.into_iter().map(|(_, p)| p).collect();
    assert_eq!(pages, vec![1, 2, 2, 2]);
}

#[tokio::test]
async fn test_malformed_body_fails_without_retry() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let responder = CatalogResponder::new(
        ResponseTemplate::new(200).set_body_string("<html>Access denied</html>"),
    )
    .page("1_5", 1, numbered_page(100, 36, None));
    mount_catalog(&server, responder).await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::Failed);
    assert_eq!(result.rows.len(), 36);
    assert_eq!(browse_requests(&server).await.len(), 2);
}

#[tokio::test]
async fn test_client_error_fails_without_retry() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path(PRODUCT_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = crawler(create_test_config(&server.uri(), dir.path()), false)
        .crawl_category(breakfast())
        .await;

    assert_eq!(result.outcome, CrawlOutcome::Failed);
    assert!(result.rows.is_empty());
    assert_eq!(result.pages_fetched, 0);
}

#[tokio::test]
async fn test_request_delay_paces_pages_but_not_retries() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // Page 2 fails once before it is served
    let responder = CatalogResponder::new(empty_page())
        .page("1_5", 1, numbered_page(100, 3, None))
        .page_sequence(
            "1_5",
            2,
            vec![ResponseTemplate::new(503), numbered_page(200, 3, None)],
        );
    let arrivals = responder.arrivals();
    mount_catalog(&server, responder).await;

    let delay = Duration::from_millis(400);
    let mut config = create_test_config(&server.uri(), dir.path());
    config.crawler.request_delay = delay.as_millis() as u64;

    let result = crawler(config, false).crawl_category(breakfast()).await;
    assert_eq!(result.outcome, CrawlOutcome::Done);
    assert_eq!(result.rows.len(), 6);

    let arrivals = arrivals.lock().unwrap().clone();
    let pages: Vec<u64> = arrivals.iter().map(|(page, _)| *page).collect();
    assert_eq!(pages, vec![1, 2, 2, 3]);

    let gap = |i: usize| arrivals[i + 1].1.duration_since(arrivals[i].1);

    // Pacing after each accepted page
    assert!(gap(0) >= delay, "page 1 to 2 took {:?}", gap(0));
    assert!(gap(2) >= delay, "page 2 to 3 took {:?}", gap(2));

    // The retry only waits for the backoff, which is zero here
    assert!(gap(1) < delay, "retry of page 2 took {:?}", gap(1));
}
