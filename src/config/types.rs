use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Pantry-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Retailer API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Site root, used for the session warm-up, referers and product URLs
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the category discovery endpoint (GET)
    #[serde(rename = "category-path")]
    pub category_path: String,

    /// Path of the category browse endpoint (POST)
    #[serde(rename = "product-path")]
    pub product_path: String,

    /// Id prefix that marks a node as a product category
    #[serde(rename = "category-prefix", default = "default_category_prefix")]
    pub category_prefix: String,
}

impl ApiConfig {
    /// Base URL without a trailing slash
    pub fn site_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn category_url(&self) -> String {
        format!("{}{}", self.site_root(), self.category_path)
    }

    pub fn product_url(&self) -> String {
        format!("{}{}", self.site_root(), self.product_path)
    }

    /// Browse page path of a category, as sent in the payload and referer
    pub fn browse_path(&self, url_part: &str) -> String {
        format!("/shop/browse/{}", url_part)
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of products requested per page
    #[serde(rename = "page-size")]
    pub page_size: u32,

    /// Delay between successful page fetches of one category (milliseconds)
    #[serde(rename = "request-delay")]
    pub request_delay: u64,

    /// Base delay for retry backoff (milliseconds)
    #[serde(rename = "retry-base-delay")]
    pub retry_base_delay: u64,

    /// Attempts per page before the category is given up
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Hard page cap per category in a full run
    #[serde(rename = "max-pages-per-category")]
    pub max_pages_per_category: u32,

    /// Page cap per category in a test run
    #[serde(rename = "test-page-limit")]
    pub test_page_limit: u32,

    /// Number of categories crawled in a test run
    #[serde(rename = "test-category-limit")]
    pub test_category_limit: usize,

    /// Number of categories crawled concurrently
    #[serde(rename = "max-workers")]
    pub max_workers: usize,

    /// Timeout for browse POST requests (seconds)
    #[serde(rename = "post-timeout", default = "default_post_timeout")]
    pub post_timeout: u64,

    /// Timeout for GET requests (seconds)
    #[serde(rename = "get-timeout", default = "default_get_timeout")]
    pub get_timeout: u64,
}

impl CrawlerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay)
    }

    /// Page cap for the active run mode
    pub fn page_limit(&self, test_run: bool) -> u32 {
        if test_run {
            self.test_page_limit
        } else {
            self.max_pages_per_category
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Full User-Agent header value
    pub value: String,

    /// Accept-Language header value
    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,
}

/// Output file configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory all output files are written to
    pub directory: PathBuf,

    #[serde(rename = "categories-file")]
    pub categories_file: String,

    #[serde(rename = "products-csv")]
    pub products_csv: String,

    #[serde(rename = "products-jsonl")]
    pub products_jsonl: String,

    #[serde(rename = "test-products-csv")]
    pub test_products_csv: String,

    #[serde(rename = "test-products-jsonl")]
    pub test_products_jsonl: String,

    #[serde(rename = "unique-products-jsonl")]
    pub unique_products_jsonl: String,

    #[serde(rename = "category-mapping-csv")]
    pub category_mapping_csv: String,

    #[serde(rename = "unique-stockcodes-csv")]
    pub unique_stockcodes_csv: String,
}

impl OutputConfig {
    pub fn categories_path(&self) -> PathBuf {
        self.directory.join(&self.categories_file)
    }

    /// CSV and JSONL product log paths for the active run mode
    pub fn product_paths(&self, test_run: bool) -> (PathBuf, PathBuf) {
        if test_run {
            (
                self.directory.join(&self.test_products_csv),
                self.directory.join(&self.test_products_jsonl),
            )
        } else {
            (
                self.directory.join(&self.products_csv),
                self.directory.join(&self.products_jsonl),
            )
        }
    }

    pub fn unique_products_path(&self) -> PathBuf {
        self.directory.join(&self.unique_products_jsonl)
    }

    pub fn category_mapping_path(&self) -> PathBuf {
        self.directory.join(&self.category_mapping_csv)
    }

    pub fn unique_stockcodes_path(&self) -> PathBuf {
        self.directory.join(&self.unique_stockcodes_csv)
    }
}

fn default_category_prefix() -> String {
    "1_".to_string()
}

fn default_post_timeout() -> u64 {
    90
}

fn default_get_timeout() -> u64 {
    30
}

fn default_accept_language() -> String {
    "en-GB,en-US;q=0.9,en;q=0.8".to_string()
}
