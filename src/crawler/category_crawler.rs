//! Paginated crawl of one category
//!
//! The crawler walks a category's listing pages with a `CrawlState` and ends
//! in a `CrawlOutcome`. It never returns an error: whatever rows were
//! gathered before a failure are handed back with the outcome.

use crate::catalog::{CategoryDescriptor, ProductRecord};
use crate::config::Config;
use crate::crawler::fetcher::{fetch_page, FetchResult};
use crate::crawler::page::{product_row, BrowseRequest, ListingPage};
use crate::crawler::scheduler::CategoryCrawl;
use crate::state::{Advance, CategoryCrawlResult, CrawlOutcome, CrawlState, PageCheck};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Pagination settings for the active run mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    pub page_size: u32,
    pub page_limit: u32,
    pub max_retries: u32,
    pub request_delay: Duration,
    pub retry_base_delay: Duration,
    pub test_run: bool,
}

impl CrawlSettings {
    pub fn from_config(config: &Config, test_run: bool) -> Self {
        let crawler = &config.crawler;
        Self {
            page_size: crawler.page_size,
            page_limit: crawler.page_limit(test_run),
            max_retries: crawler.max_retries,
            request_delay: crawler.request_delay(),
            retry_base_delay: crawler.retry_base_delay(),
            test_run,
        }
    }
}

/// Crawls categories against the browse endpoint
///
/// Cloning is cheap; every clone shares the same session client.
#[derive(Debug, Clone)]
pub struct CategoryCrawler {
    client: Client,
    config: Arc<Config>,
    settings: CrawlSettings,
}

impl CategoryCrawler {
    pub fn new(client: Client, config: Arc<Config>, test_run: bool) -> Self {
        let settings = CrawlSettings::from_config(&config, test_run);
        Self {
            client,
            config,
            settings,
        }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    /// Crawls every page of `category` until it is exhausted, fails, or hits the page cap
    ///
    /// # Stop Conditions
    ///
    /// | Condition | Outcome |
    /// |-----------|---------|
    /// | Page number above the page cap | SafetyStopped |
    /// | Page with no products | Done |
    /// | Page repeating the previous page | Done |
    /// | Last page from the total-count hint | Done |
    /// | Retries exhausted, rejected status, bad body | Failed |
    pub async fn crawl_category(&self, category: CategoryDescriptor) -> CategoryCrawlResult {
        let label = category.log_label();
        let browse_path = self.config.api.browse_path(category.url_part());
        let site_root = self.config.api.site_root();
        tracing::info!("--- Starting {} ---", label);

        let mut state = CrawlState::new(self.settings.page_limit, self.settings.page_size);
        let mut rows: Vec<ProductRecord> = Vec::new();

        let outcome = loop {
            if state.limit_reached() {
                if self.settings.test_run {
                    tracing::warn!(
                        "--- {}: TEST RUN: Page limit ({}) reached.",
                        label,
                        state.page_limit()
                    );
                } else {
                    tracing::error!(
                        "--- {}: SAFETY STOP: Reached max page limit ({}). Check API behavior.",
                        label,
                        state.page_limit()
                    );
                }
                break CrawlOutcome::SafetyStopped;
            }

            let page_number = state.page();
            let request =
                BrowseRequest::new(&category, &browse_path, page_number, self.settings.page_size);

            let listing = match self.fetch_listing(&mut state, &request, &browse_path, &label).await {
                Ok(listing) => listing,
                Err(outcome) => break outcome,
            };

            if state.last_page().is_none() {
                state.observe_total(listing.total);
                if let Some(last) = state.last_page() {
                    tracing::info!(
                        "{}: Found Total Records: {}. Calculated Last Page: {}",
                        label,
                        listing.total.unwrap_or_default(),
                        last
                    );
                }
            }

            let page_rows: Vec<ProductRecord> = listing
                .products
                .iter()
                .map(|product| product_row(product, &category, site_root))
                .collect();

            match state.check_page(&page_rows) {
                PageCheck::Empty => {
                    tracing::info!(
                        "{}: No products found page {}. End of category.",
                        label,
                        page_number
                    );
                    break CrawlOutcome::Done;
                }
                PageCheck::Repeated => {
                    tracing::warn!(
                        "{}: Duplicate page {} detected. Stopping category.",
                        label,
                        page_number
                    );
                    break CrawlOutcome::Done;
                }
                PageCheck::Fresh => {
                    tracing::debug!(
                        "{}: Found {} products page {}.",
                        label,
                        page_rows.len(),
                        page_number
                    );
                }
            }

            let next = state.advance(&page_rows);
            rows.extend(page_rows);

            match next {
                Advance::Finished => {
                    tracing::info!(
                        "{}: Reached calculated last page ({}). Stopping category.",
                        label,
                        page_number
                    );
                    break CrawlOutcome::Done;
                }
                Advance::Next(_) => tokio::time::sleep(self.settings.request_delay).await,
            }
        };

        tracing::info!(
            "--- Finished {} ({}). Found {} products. ---",
            label,
            outcome,
            rows.len()
        );

        CategoryCrawlResult::new(category, rows, outcome, state.pages_fetched())
    }

    /// Fetches and decodes the current page, retrying transient failures
    async fn fetch_listing(
        &self,
        state: &mut CrawlState,
        request: &BrowseRequest,
        browse_path: &str,
        label: &str,
    ) -> Result<ListingPage, CrawlOutcome> {
        let page_number = request.page_number;

        loop {
            tracing::info!(
                "{}: Requesting Page {}. Attempt {}/{}",
                label,
                page_number,
                state.attempts() + 1,
                self.settings.max_retries
            );

            match fetch_page(&self.client, &self.config, request, browse_path).await {
                FetchResult::Success { status_code, body } => {
                    tracing::debug!(
                        "{}: Received Page {} (Status: {}).",
                        label,
                        page_number,
                        status_code
                    );
                    return ListingPage::parse(&body).map_err(|e| {
                        tracing::error!(
                            "{}: {} on page {}. Stopping category.",
                            label,
                            e,
                            page_number
                        );
                        CrawlOutcome::Failed
                    });
                }
                FetchResult::Rejected { status_code } => {
                    tracing::error!(
                        "{}: Request rejected ({}) page {}. Stopping category.",
                        label,
                        status_code,
                        page_number
                    );
                    return Err(CrawlOutcome::Failed);
                }
                FetchResult::Retryable { reason } => {
                    tracing::warn!("{}: {} page {}. Retrying...", label, reason, page_number);

                    match state.register_failure(self.settings.max_retries, self.settings.retry_base_delay) {
                        Some(backoff) => tokio::time::sleep(backoff).await,
                        None => {
                            tracing::error!(
                                "{}: Max retries page {}. Stopping category.",
                                label,
                                page_number
                            );
                            return Err(CrawlOutcome::Failed);
                        }
                    }
                }
            }
        }
    }
}

impl CategoryCrawl for CategoryCrawler {
    fn crawl(&self, category: CategoryDescriptor) -> impl Future<Output = CategoryCrawlResult> + Send {
        self.crawl_category(category)
    }
}
