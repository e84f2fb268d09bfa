//! Bounded worker pool for category crawls
//!
//! This module handles:
//! - One task per category, spawned into a `JoinSet`
//! - Global concurrency limiting via a semaphore
//! - Delivering results to a single consumer in completion order
//! - Isolating panicking tasks from their siblings

use crate::catalog::CategoryDescriptor;
use crate::state::{CategoryCrawlResult, CrawlOutcome};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

/// Something that can crawl one category to completion
pub trait CategoryCrawl: Send + Sync + 'static {
    /// Crawls `category`; must not fail past its own boundary
    fn crawl(&self, category: CategoryDescriptor) -> impl Future<Output = CategoryCrawlResult> + Send;
}

/// Counts reported once every category has been consumed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Results delivered to the consumer
    pub delivered: usize,

    /// Ids of categories whose task panicked
    pub panicked: Vec<String>,
}

/// Scheduler running category crawls on a bounded pool
///
/// The scheduler coordinates:
/// - Global concurrency limits (at most `max_workers` crawls in flight)
/// - One shared crawler (and with it one shared session client)
/// - The completion loop, the only place results are consumed
pub struct CrawlScheduler<C> {
    crawler: Arc<C>,

    /// Global semaphore for limiting concurrent crawls
    semaphore: Arc<Semaphore>,

    max_workers: usize,
}

impl<C: CategoryCrawl> CrawlScheduler<C> {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `crawler` - The crawler shared by every task
    /// * `max_workers` - Maximum number of categories crawled at once
    pub fn new(crawler: C, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            crawler: Arc::new(crawler),
            semaphore: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Crawls every category and feeds each result to `consume` as it completes
    ///
    /// Results arrive in completion order, not submission order. A task that
    /// panics is logged and delivered as a `Failed` result with no rows.
    pub async fn run<F>(&self, categories: Vec<CategoryDescriptor>, mut consume: F) -> ScheduleReport
    where
        F: FnMut(CategoryCrawlResult),
    {
        let total = categories.len();
        let mut tasks = JoinSet::new();

        // Task id to its category, so a panicked task can still be attributed
        let mut in_flight: HashMap<Id, CategoryDescriptor> = HashMap::with_capacity(total);

        for category in categories {
            let crawler = Arc::clone(&self.crawler);
            let semaphore = Arc::clone(&self.semaphore);
            let descriptor = category.clone();

            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                crawler.crawl(category).await
            });
            in_flight.insert(handle.id(), descriptor);
        }

        tracing::info!(
            "Submitted {} categories to a pool of {} workers.",
            total,
            self.max_workers
        );

        let mut report = ScheduleReport::default();

        while let Some(joined) = tasks.join_next_with_id().await {
            let result = match joined {
                Ok((id, result)) => {
                    in_flight.remove(&id);
                    result
                }
                Err(e) => {
                    let Some(category) = in_flight.remove(&e.id()) else {
                        tracing::error!("A category pool task failed: {}", e);
                        continue;
                    };
                    tracing::error!(
                        "{}: crawl task failed: {}",
                        category.log_label(),
                        e
                    );
                    if e.is_panic() {
                        report.panicked.push(category.id.clone());
                    }
                    CategoryCrawlResult::empty(category, CrawlOutcome::Failed)
                }
            };

            report.delivered += 1;
            tracing::info!(
                "{} finished with {} products ({}). ({}/{} categories completed)",
                result.category.log_label(),
                result.rows.len(),
                result.outcome,
                report.delivered,
                total
            );
            consume(result);
        }

        report
    }
}
