//! Shared fixtures for the integration tests

use pantry_harvest::config::{ApiConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use wiremock::{Request, Respond, ResponseTemplate};

pub const CATEGORY_PATH: &str = "/apis/ui/PiesCategoriesWithSpecials";
pub const PRODUCT_PATH: &str = "/apis/ui/browse/category";

/// Creates a test configuration pointing at `base_url` and writing into `dir`
pub fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            category_path: CATEGORY_PATH.to_string(),
            product_path: PRODUCT_PATH.to_string(),
            category_prefix: "1_".to_string(),
        },
        crawler: CrawlerConfig {
            page_size: 36,
            request_delay: 0, // No pacing in tests
            retry_base_delay: 0,
            max_retries: 3,
            max_pages_per_category: 200,
            test_page_limit: 5,
            test_category_limit: 2,
            max_workers: 4,
            post_timeout: 5,
            get_timeout: 5,
        },
        user_agent: UserAgentConfig {
            value: "TestHarvester/1.0".to_string(),
            accept_language: "en-GB,en;q=0.8".to_string(),
        },
        output: OutputConfig {
            directory: dir.to_path_buf(),
            categories_file: "categories.csv".to_string(),
            products_csv: "products.csv".to_string(),
            products_jsonl: "products.jsonl".to_string(),
            test_products_csv: "products_test.csv".to_string(),
            test_products_jsonl: "products_test.jsonl".to_string(),
            unique_products_jsonl: "unique_products.jsonl".to_string(),
            category_mapping_csv: "category_mapping.csv".to_string(),
            unique_stockcodes_csv: "unique_stockcodes.csv".to_string(),
        },
    }
}

/// One API product with a nutrition panel and optional dietary statement
pub fn api_product(stockcode: u64, dietary: Option<&str>, protein: &str, sugars: &str) -> Value {
    let panel = json!({
        "Attributes": [
            {"Name": "Protein - Total - NIP Quantity Per 100g", "Value": protein},
            {"Name": "Sugars Quantity Per 100g", "Value": sugars}
        ]
    });

    let mut attributes = json!({ "nutritionalinformation": panel.to_string() });
    if let Some(statement) = dietary {
        attributes["lifestyleanddietarystatement"] = json!(statement);
    }

    json!({
        "Stockcode": stockcode,
        "DisplayName": format!("Product {}", stockcode),
        "UrlFriendlyName": format!("product-{}", stockcode),
        "Price": 2.5,
        "AdditionalAttributes": attributes
    })
}

/// A browse response body holding `products` in a single bundle
pub fn listing_body(products: Vec<Value>, total: Option<u64>) -> Value {
    let mut body = json!({
        "Bundles": [{ "Products": products }]
    });
    if let Some(total) = total {
        body["TotalRecordCount"] = json!(total);
    }
    body
}

/// A listing page of `count` plain products numbered from `first`
pub fn numbered_page(first: u64, count: u64, total: Option<u64>) -> ResponseTemplate {
    let products = (first..first + count)
        .map(|code| api_product(code, None, "5", "1"))
        .collect();
    ResponseTemplate::new(200).set_body_json(listing_body(products, total))
}

/// Responds to browse requests by category id and page number
///
/// A page can be given a sequence of responses; the last one repeats.
/// Requests for unknown pages get the fallback response. Every request's
/// page number and arrival time is recorded.
pub struct CatalogResponder {
    pages: HashMap<(String, u64), Vec<ResponseTemplate>>,
    fallback: ResponseTemplate,
    served: Mutex<HashMap<(String, u64), usize>>,
    arrivals: Arc<Mutex<Vec<(u64, Instant)>>>,
}

impl CatalogResponder {
    pub fn new(fallback: ResponseTemplate) -> Self {
        Self {
            pages: HashMap::new(),
            fallback,
            served: Mutex::new(HashMap::new()),
            arrivals: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn page(self, category_id: &str, page_number: u64, response: ResponseTemplate) -> Self {
        self.page_sequence(category_id, page_number, vec![response])
    }

    pub fn page_sequence(
        mut self,
        category_id: &str,
        page_number: u64,
        responses: Vec<ResponseTemplate>,
    ) -> Self {
        self.pages
            .insert((category_id.to_string(), page_number), responses);
        self
    }

    /// Shared log of `(page number, arrival time)` for every browse request
    pub fn arrivals(&self) -> Arc<Mutex<Vec<(u64, Instant)>>> {
        Arc::clone(&self.arrivals)
    }
}

impl Respond for CatalogResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(payload) = serde_json::from_slice::<Value>(&request.body) else {
            return ResponseTemplate::new(400);
        };

        let category = payload["categoryId"].as_str().unwrap_or_default().to_string();
        let page_number = payload["pageNumber"].as_u64().unwrap_or_default();
        self.arrivals
            .lock()
            .unwrap()
            .push((page_number, Instant::now()));

        let key = (category, page_number);
        let Some(responses) = self.pages.get(&key) else {
            return self.fallback.clone();
        };

        let mut served = self.served.lock().unwrap();
        let count = served.entry(key).or_insert(0);
        let response = responses
            .get(*count)
            .or_else(|| responses.last())
            .unwrap_or(&self.fallback)
            .clone();
        *count += 1;
        response
    }
}

/// An empty listing page
pub fn empty_page() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(listing_body(Vec::new(), None))
}

/// Page numbers of every browse request the server received, in arrival order
pub async fn browse_requests(server: &wiremock::MockServer) -> Vec<(String, u64)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == PRODUCT_PATH)
        .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
        .map(|payload| {
            (
                payload["categoryId"].as_str().unwrap_or_default().to_string(),
                payload["pageNumber"].as_u64().unwrap_or_default(),
            )
        })
        .collect()
}
