//! Per-category crawl state
//!
//! # Components
//!
//! - `CrawlState`: pagination bookkeeping for one category (page cursor, last page, retry counter)
//! - `CrawlOutcome`: how a category crawl ended
//! - `CategoryCrawlResult`: the rows and outcome handed back to the scheduler

mod crawl_state;
mod outcome;

pub use crawl_state::{Advance, CrawlState, PageCheck};
pub use outcome::{CategoryCrawlResult, CrawlOutcome};
