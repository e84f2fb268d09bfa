//! Run statistics
//!
//! This module accumulates per-category results into a run summary and
//! prints it at the end of a crawl.

use crate::output::traits::BatchReport;
use crate::state::{CategoryCrawlResult, CrawlOutcome};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Summary of one crawl run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// "FULL SCRAPE" or "TEST RUN"
    pub mode: &'static str,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Hash of the config file the run was started with
    pub config_hash: Option<String>,

    /// Categories submitted to the scheduler
    pub categories_total: usize,

    /// Categories whose result reached the writer
    pub categories_finished: usize,

    /// Count of categories by outcome
    pub outcomes: HashMap<CrawlOutcome, usize>,

    /// Category tasks that panicked
    pub panicked: usize,

    /// Product sightings handed to the writer
    pub products_scraped: usize,

    pub pages_fetched: u64,

    /// Sink writes that failed
    pub failed_writes: usize,
}

impl RunSummary {
    pub fn new(test_run: bool, categories_total: usize) -> Self {
        Self {
            mode: if test_run { "TEST RUN" } else { "FULL SCRAPE" },
            started_at: Utc::now(),
            finished_at: None,
            config_hash: None,
            categories_total,
            categories_finished: 0,
            outcomes: HashMap::new(),
            panicked: 0,
            products_scraped: 0,
            pages_fetched: 0,
            failed_writes: 0,
        }
    }

    /// Records one category result and the report of its batch
    pub fn record(&mut self, result: &CategoryCrawlResult, report: BatchReport) {
        self.categories_finished += 1;
        *self.outcomes.entry(result.outcome).or_insert(0) += 1;
        self.products_scraped += result.rows.len();
        self.pages_fetched += u64::from(result.pages_fetched);
        self.failed_writes += report.failed_sinks();
    }

    pub fn record_panic(&mut self) {
        self.panicked += 1;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn count(&self, outcome: CrawlOutcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

/// Prints a run summary to stdout in a formatted manner
///
/// # Arguments
///
/// * `summary` - The summary to display
pub fn print_summary(summary: &RunSummary) {
    println!("=== {} Summary ===\n", summary.mode);

    println!("Run:");
    println!("  Started: {}", summary.started_at.to_rfc3339());
    if let Some(finished) = summary.finished_at {
        println!("  Finished: {}", finished.to_rfc3339());
    }
    if let Some(seconds) = summary.duration_seconds() {
        println!("  Duration: {}s", seconds);
    }
    if let Some(hash) = &summary.config_hash {
        println!("  Config hash: {}", hash);
    }
    println!();

    println!("Categories:");
    println!(
        "  Completed: {} / {}",
        summary.categories_finished, summary.categories_total
    );
    for outcome in CrawlOutcome::all() {
        let count = summary.count(outcome);
        let percentage = if summary.categories_finished > 0 {
            (count as f64 / summary.categories_finished as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", outcome, count, percentage);
    }
    if summary.panicked > 0 {
        println!("  Panicked tasks: {}", summary.panicked);
    }
    println!();

    println!("Products:");
    println!("  Sightings saved: {}", summary.products_scraped);
    println!("  Pages fetched: {}", summary.pages_fetched);
    if summary.failed_writes > 0 {
        println!("  Failed sink writes: {}", summary.failed_writes);
    }
}
