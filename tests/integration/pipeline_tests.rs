//! End-to-end tests: discovery, crawl, deduplication and browsing
//!
//! Every stage reads the files the previous stage wrote, exactly as the
//! command-line modes do.

use crate::common::{
    api_product, browse_requests, create_test_config, empty_page, listing_body, CatalogResponder,
    CATEGORY_PATH, PRODUCT_PATH,
};
use pantry_harvest::catalog::{load_categories, save_categories, CategoryDescriptor};
use pantry_harvest::config::Config;
use pantry_harvest::crawler::{run_crawl, run_discovery, HarvestContext};
use pantry_harvest::dedup::run_dedup;
use pantry_harvest::query::CatalogView;
use pantry_harvest::{CrawlOutcome, HarvestError};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn category_tree() -> Value {
    json!({
        "Categories": [
            {
                "NodeId": "specialsgroup",
                "Description": "Specials",
                "Children": [
                    {"NodeId": "specials_half", "Description": "Half Price", "ParentNodeId": "specialsgroup"}
                ]
            },
            {
                "NodeId": "1_1",
                "Description": "Pantry",
                "ParentNodeId": "",
                "NodeLevel": 1,
                "UrlFriendlyName": "pantry",
                "Children": [
                    {
                        "NodeId": "1_5",
                        "Description": "Breakfast",
                        "ParentNodeId": "1_1",
                        "NodeLevel": 2,
                        "UrlFriendlyName": "pantry/breakfast"
                    },
                    {
                        "NodeId": "1_9",
                        "Description": "Oats",
                        "ParentNodeId": "1_1",
                        "NodeLevel": "2",
                        "UrlFriendlyName": "pantry/oats"
                    }
                ]
            }
        ]
    })
}

/// Product 100 is listed in both leaf categories
fn catalog() -> CatalogResponder {
    let breakfast = listing_body(
        vec![
            api_product(100, Some("Vegan, Dairy Free"), "12", "1"),
            api_product(200, Some("Gluten Free"), "8", "3"),
        ],
        Some(2),
    );
    let oats = listing_body(
        vec![
            api_product(100, Some("Vegan, Dairy Free"), "12", "1"),
            api_product(300, Some("VEGAN"), "20g", "<1g"),
        ],
        Some(2),
    );

    CatalogResponder::new(empty_page())
        .page("1_5", 1, ResponseTemplate::new(200).set_body_json(breakfast))
        .page("1_9", 1, ResponseTemplate::new(200).set_body_json(oats))
}

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "session=abc; Path=/"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(CATEGORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(category_tree()))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(PRODUCT_PATH))
        .respond_with(catalog())
        .mount(server)
        .await;
}

fn context(config: Config, test_run: bool) -> HarvestContext {
    HarvestContext::new(config, test_run, Some(2)).expect("Failed to build context")
}

fn csv_rows(path: &Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader.records().map(|r| r.unwrap()).collect()
}

fn jsonl_lines(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .count()
}

fn header_count(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|l| l.starts_with("Stockcode,"))
        .count()
}

#[tokio::test]
async fn test_full_pipeline() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_site(&server).await;

    let config = create_test_config(&server.uri(), dir.path());
    let output = config.output.clone();
    let ctx = context(config, false);
    ctx.warm_up().await;

    // Discovery
    let categories = run_discovery(&ctx).await.expect("Discovery failed");
    let ids: Vec<&str> = categories.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["1_1", "1_5", "1_9"]);
    assert_eq!(categories[2].level, Some(2));

    let saved = load_categories(&output.categories_path()).unwrap();
    assert_eq!(saved, categories);

    // Crawl
    let summary = run_crawl(&ctx, false).await.expect("Crawl failed");
    assert_eq!(summary.categories_total, 3);
    assert_eq!(summary.categories_finished, 3);
    assert_eq!(summary.count(CrawlOutcome::Done), 3);
    assert_eq!(summary.products_scraped, 4);
    assert_eq!(summary.failed_writes, 0);
    assert!(summary.finished_at.is_some());

    let (csv_path, jsonl_path) = output.product_paths(false);
    assert_eq!(header_count(&csv_path), 1);
    assert_eq!(csv_rows(&csv_path).len(), 4);
    assert_eq!(jsonl_lines(&jsonl_path), 4);
    assert!(!output.product_paths(true).0.exists());

    // Deduplication
    let report = run_dedup(&output, &jsonl_path).expect("Dedup failed");
    assert_eq!(report.records_read, 4);
    assert_eq!(report.malformed_lines, 0);
    assert_eq!(report.unique_products, 3);
    assert_eq!(report.mapping_rows, 4);

    // Browsing
    let view = CatalogView::load(&output).expect("Failed to load catalog");
    let shared = view
        .products()
        .iter()
        .find(|p| p.stockcode == "100")
        .expect("Product 100 missing");
    let memberships: BTreeSet<&str> = shared
        .categories
        .iter()
        .map(|c| c.category_id.as_str())
        .collect();
    assert_eq!(memberships, BTreeSet::from(["1_5", "1_9"]));

    let mut vegan = view.products_for_category("1_9", Some("vegan"));
    vegan.sort_by(|a, b| a.stockcode.cmp(&b.stockcode));
    assert_eq!(vegan.len(), 2);
    assert_eq!(vegan[0].stockcode, "100");
    assert_eq!(vegan[0].protein_per_g, 0.12);
    assert_eq!(vegan[1].stockcode, "300");
    assert_eq!(vegan[1].protein_per_g, 0.2);
    assert_eq!(vegan[1].sugar_per_100g, 1.0);

    let breakfast = view.products_for_category("1_5", Some("gluten"));
    assert_eq!(breakfast.len(), 1);
    assert_eq!(breakfast[0].stockcode, "200");

    assert_eq!(view.dietary_tags(), vec!["dairy free", "gluten free", "vegan"]);

    // The mapping only knows the leaf categories, whose parent had no products
    let forest = view.forest();
    assert_eq!(forest.roots().count(), 0);
    assert_eq!(forest.orphans().count(), 2);
}

#[tokio::test]
async fn test_test_run_limits_categories_and_uses_test_files() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_site(&server).await;

    let config = create_test_config(&server.uri(), dir.path());
    let output = config.output.clone();

    let categories: Vec<CategoryDescriptor> = ["1_5", "1_9", "1_12"]
        .iter()
        .map(|id| CategoryDescriptor {
            id: id.to_string(),
            name: format!("Category {}", id),
            parent_id: "1_1".to_string(),
            level: Some(2),
            url_key: String::new(),
        })
        .collect();
    save_categories(&output.categories_path(), &categories).unwrap();

    let summary = run_crawl(&context(config, true), false).await.unwrap();
    assert_eq!(summary.mode, "TEST RUN");
    assert_eq!(summary.categories_total, 2);
    assert_eq!(summary.products_scraped, 4);

    let crawled: BTreeSet<String> = browse_requests(&server)
        .await
        .into_iter()
        .map(|(category, _)| category)
        .collect();
    assert_eq!(crawled, BTreeSet::from(["1_5".to_string(), "1_9".to_string()]));

    let (test_csv, test_jsonl) = output.product_paths(true);
    assert_eq!(csv_rows(&test_csv).len(), 4);
    assert_eq!(jsonl_lines(&test_jsonl), 4);
    assert!(!output.product_paths(false).0.exists());
}

#[tokio::test]
async fn test_rerun_appends_unless_fresh() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_site(&server).await;

    let config = create_test_config(&server.uri(), dir.path());
    let output = config.output.clone();
    let ctx = context(config, false);
    run_discovery(&ctx).await.unwrap();

    run_crawl(&ctx, false).await.unwrap();
    run_crawl(&ctx, false).await.unwrap();

    let (csv_path, jsonl_path) = output.product_paths(false);
    assert_eq!(header_count(&csv_path), 1);
    assert_eq!(csv_rows(&csv_path).len(), 8);
    assert_eq!(jsonl_lines(&jsonl_path), 8);

    run_crawl(&ctx, true).await.unwrap();
    assert_eq!(header_count(&csv_path), 1);
    assert_eq!(csv_rows(&csv_path).len(), 4);
    assert_eq!(jsonl_lines(&jsonl_path), 4);
}

#[tokio::test]
async fn test_failed_category_does_not_stop_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let responder = CatalogResponder::new(empty_page())
        .page("1_5", 1, ResponseTemplate::new(403))
        .page(
            "1_9",
            1,
            ResponseTemplate::new(200).set_body_json(listing_body(
                vec![api_product(300, None, "1", "1")],
                Some(1),
            )),
        );
    Mock::given(method("POST"))
        .and(path(PRODUCT_PATH))
        .respond_with(responder)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path());
    let output = config.output.clone();
    let categories: Vec<CategoryDescriptor> = ["1_5", "1_9"]
        .iter()
        .map(|id| CategoryDescriptor {
            id: id.to_string(),
            name: String::new(),
            parent_id: String::new(),
            level: None,
            url_key: String::new(),
        })
        .collect();
    save_categories(&output.categories_path(), &categories).unwrap();

    let summary = run_crawl(&context(config, false), false).await.unwrap();
    assert_eq!(summary.categories_finished, 2);
    assert_eq!(summary.count(CrawlOutcome::Failed), 1);
    assert_eq!(summary.count(CrawlOutcome::Done), 1);
    assert_eq!(summary.products_scraped, 1);
}

#[tokio::test]
async fn test_crawl_without_category_table_fails_before_requests() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_site(&server).await;

    let ctx = context(create_test_config(&server.uri(), dir.path()), false);
    let result = run_crawl(&ctx, false).await;

    assert!(matches!(result, Err(HarvestError::MissingInput(_))));
    assert!(browse_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_discovery_rejects_unexpected_shape() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(CATEGORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Nodes": []})))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path());
    let categories_path = config.output.categories_path();
    let result = run_discovery(&context(config, false)).await;

    assert!(matches!(result, Err(HarvestError::UnexpectedResponse { .. })));
    assert!(!categories_path.exists());
}

#[tokio::test]
async fn test_discovery_http_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(CATEGORY_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = run_discovery(&context(create_test_config(&server.uri(), dir.path()), false)).await;
    assert!(matches!(result, Err(HarvestError::Http { .. })));
}

#[tokio::test]
async fn test_failed_warm_up_is_not_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // No mock for the site root: the warm-up gets a 404
    Mock::given(method("GET"))
        .and(path(CATEGORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(category_tree()))
        .mount(&server)
        .await;

    let ctx = context(create_test_config(&server.uri(), dir.path()), false);
    ctx.warm_up().await;

    let categories = run_discovery(&ctx).await.unwrap();
    assert_eq!(categories.len(), 3);
}

#[tokio::test]
async fn test_dedup_without_product_log() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("http://127.0.0.1:9", dir.path());
    let (_, jsonl_path) = config.output.product_paths(false);

    let result = run_dedup(&config.output, &jsonl_path);
    assert!(matches!(result, Err(HarvestError::MissingInput(_))));
}
