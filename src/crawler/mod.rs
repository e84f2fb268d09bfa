//! Crawler module for category discovery and paginated product crawling
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with response classification
//! - The browse endpoint wire format
//! - Per-category pagination with retry and stop conditions
//! - The bounded worker pool
//! - Overall discovery and crawl coordination

mod category_crawler;
mod coordinator;
mod fetcher;
mod page;
mod scheduler;

pub use category_crawler::{CategoryCrawler, CrawlSettings};
pub use coordinator::{prepare_output_dir, run_crawl, run_discovery, HarvestContext};
pub use fetcher::{
    build_http_client, fetch_category_tree, fetch_page, is_retryable_status, warm_up_session,
    FetchResult,
};
pub use page::{product_row, BrowseRequest, ListingPage, PageError};
pub use scheduler::{CategoryCrawl, CrawlScheduler, ScheduleReport};
