//! Harvest coordinator - discovery and crawl orchestration
//!
//! This module contains the run-level logic that ties the components together:
//! - Building the harvest context (config, shared session client, run mode)
//! - Preparing the output directory
//! - Category discovery and persistence of the category table
//! - Loading categories, applying run-mode limits and driving the scheduler
//! - Feeding every category batch to the incremental writer

use crate::catalog::{extract_categories, load_categories, save_categories, CategoryDescriptor};
use crate::config::Config;
use crate::crawler::category_crawler::CategoryCrawler;
use crate::crawler::fetcher::{build_http_client, fetch_category_tree, warm_up_session};
use crate::crawler::scheduler::CrawlScheduler;
use crate::output::{IncrementalWriter, RunSummary};
use crate::HarvestError;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a harvest operation needs, built once at startup
#[derive(Debug, Clone)]
pub struct HarvestContext {
    pub config: Arc<Config>,
    pub client: Client,
    pub test_run: bool,
    pub max_workers: usize,
    pub config_hash: Option<String>,
}

impl HarvestContext {
    /// Creates a new context
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `test_run` - Whether crawl limits and file names of a test run apply
    /// * `max_workers` - Overrides the configured worker count when set
    ///
    /// # Returns
    ///
    /// * `Ok(HarvestContext)` - Successfully created context
    /// * `Err(HarvestError)` - The HTTP client could not be built
    pub fn new(config: Config, test_run: bool, max_workers: Option<usize>) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.user_agent)?;
        let max_workers = max_workers.unwrap_or(config.crawler.max_workers).max(1);

        Ok(Self {
            config: Arc::new(config),
            client,
            test_run,
            max_workers,
            config_hash: None,
        })
    }

    pub fn with_config_hash(mut self, hash: String) -> Self {
        self.config_hash = Some(hash);
        self
    }

    /// CSV and JSONL product log paths for the run mode
    pub fn product_paths(&self) -> (PathBuf, PathBuf) {
        self.config.output.product_paths(self.test_run)
    }

    /// Issues the session warm-up request
    pub async fn warm_up(&self) {
        warm_up_session(&self.client, &self.config).await;
    }
}

/// Creates the output directory if needed
///
/// Failure is fatal: nothing can be written without it.
pub fn prepare_output_dir(config: &Config) -> Result<(), HarvestError> {
    let dir = &config.output.directory;
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        tracing::info!("Created directory: {}", dir.display());
    }
    Ok(())
}

/// Discovers the category taxonomy and saves it as the category table
///
/// # Returns
///
/// * `Ok(Vec<CategoryDescriptor>)` - The discovered categories, in pre-order
/// * `Err(HarvestError)` - The discovery request failed or had an unexpected shape
pub async fn run_discovery(ctx: &HarvestContext) -> Result<Vec<CategoryDescriptor>, HarvestError> {
    tracing::info!("=== DISCOVER ONLY MODE ===");
    prepare_output_dir(&ctx.config)?;

    let response = fetch_category_tree(&ctx.client, &ctx.config).await?;
    let categories = extract_categories(&response, &ctx.config.api.category_prefix).ok_or_else(|| {
        HarvestError::UnexpectedResponse {
            url: ctx.config.api.category_url(),
            message: "Unexpected category response format: no Categories array".to_string(),
        }
    })?;

    if categories.is_empty() {
        tracing::warn!("No valid product categories extracted.");
    } else {
        tracing::info!("Extracted {} potential product categories.", categories.len());
    }

    let path = ctx.config.output.categories_path();
    save_categories(&path, &categories)?;
    tracing::info!("Saved categories: {}", path.display());
    tracing::info!("=== Discover Finished ===");

    Ok(categories)
}

/// Crawls every category of the category table
///
/// Setup failures (output directory, missing category table, unreadable
/// existing CSV) are returned as errors before any request is made. Once
/// scheduling starts, nothing aborts the run.
///
/// # Arguments
///
/// * `ctx` - The harvest context
/// * `fresh` - Remove existing product logs of this run mode first
pub async fn run_crawl(ctx: &HarvestContext, fresh: bool) -> Result<RunSummary, HarvestError> {
    let run_mode = if ctx.test_run { "TEST RUN" } else { "FULL SCRAPE" };
    let categories_path = ctx.config.output.categories_path();

    tracing::info!(
        "=== {} using {} with up to {} workers ===",
        run_mode,
        categories_path.display(),
        ctx.max_workers
    );

    prepare_output_dir(&ctx.config)?;

    let categories = load_categories(&categories_path)?;
    tracing::info!(
        "Loaded {} categories from {}.",
        categories.len(),
        categories_path.display()
    );

    let categories = select_categories(
        categories,
        ctx.test_run,
        ctx.config.crawler.test_category_limit,
    );

    let (csv_path, jsonl_path) = ctx.product_paths();
    if fresh {
        remove_existing(&[csv_path.as_path(), jsonl_path.as_path()]);
    }

    let mut writer = IncrementalWriter::open(&csv_path, &jsonl_path)?;
    let mut summary = RunSummary::new(ctx.test_run, categories.len());
    summary.config_hash = ctx.config_hash.clone();

    if categories.is_empty() {
        tracing::warn!("Category table is empty. Nothing to crawl.");
        summary.finish();
        return Ok(summary);
    }

    let crawler = CategoryCrawler::new(ctx.client.clone(), Arc::clone(&ctx.config), ctx.test_run);
    let scheduler = CrawlScheduler::new(crawler, ctx.max_workers);

    let report = scheduler
        .run(categories, |result| {
            let batch = writer.append_batch(&result.rows);
            summary.record(&result, batch);
            tracing::info!("Total scraped: {}", summary.products_scraped);
        })
        .await;

    for _ in &report.panicked {
        summary.record_panic();
    }
    summary.finish();

    tracing::info!("=== Product Scraping Completed ===");
    tracing::info!("Total products saved: {}", summary.products_scraped);
    if summary.products_scraped > 0 {
        tracing::info!(
            "Data saved to {} and {}",
            csv_path.display(),
            jsonl_path.display()
        );
    } else {
        tracing::warn!("No products scraped.");
    }
    tracing::info!("=== {} Finished ===", run_mode);

    Ok(summary)
}

/// Applies the test-run category limit
fn select_categories(
    mut categories: Vec<CategoryDescriptor>,
    test_run: bool,
    limit: usize,
) -> Vec<CategoryDescriptor> {
    if !test_run {
        return categories;
    }

    if categories.len() > limit {
        tracing::warn!("--- TEST: Limiting to first {} categories. ---", limit);
        categories.truncate(limit);
    } else {
        tracing::info!(
            "--- TEST: Processing all {} loaded categories. ---",
            categories.len()
        );
    }
    categories
}

/// Removes output files left by an earlier run; failures fall back to appending
fn remove_existing(paths: &[&Path]) {
    for path in paths.iter().filter(|p| p.exists()) {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::info!("Removed: {}", path.display()),
            Err(e) => tracing::error!(
                "Could not remove {}: {}. Appending instead.",
                path.display(),
                e
            ),
        }
    }
}
