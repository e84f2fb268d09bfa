use crate::catalog::ProductRecord;
use std::collections::BTreeSet;
use std::time::Duration;

/// What the rows of a freshly fetched page say about the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCheck {
    /// The page has no products; the category is exhausted
    Empty,

    /// The page repeats the previous page's products
    Repeated,

    /// The page carries new rows
    Fresh,
}

/// Where the crawl goes after a page was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// The computed last page was reached
    Finished,

    /// Continue with this page number
    Next(u32),
}

/// Per-category pagination state
///
/// Owned by a single category crawl. It holds no I/O; the crawler feeds it
/// pages and failures and follows the decisions it returns.
#[derive(Debug, Clone)]
pub struct CrawlState {
    /// Current page number, starting at 1
    page: u32,

    page_limit: u32,

    page_size: u32,

    /// Derived from the first total-count hint, then fixed
    last_page: Option<u32>,

    /// Stockcodes seen on the previously accepted page
    previous_identities: BTreeSet<String>,

    /// Failed attempts for the current page
    attempts: u32,

    pages_fetched: u32,
}

impl CrawlState {
    pub fn new(page_limit: u32, page_size: u32) -> Self {
        Self {
            page: 1,
            page_limit,
            page_size: page_size.max(1),
            last_page: None,
            previous_identities: BTreeSet::new(),
            attempts: 0,
            pages_fetched: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_limit(&self) -> u32 {
        self.page_limit
    }

    pub fn last_page(&self) -> Option<u32> {
        self.last_page
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns true when the current page lies beyond the page cap
    pub fn limit_reached(&self) -> bool {
        self.page > self.page_limit
    }

    /// Records a total-record-count hint
    ///
    /// Only the first hint is used. The last page is
    /// `max(1, ceil(total / page_size))`.
    pub fn observe_total(&mut self, total: Option<u64>) {
        if self.last_page.is_some() {
            return;
        }

        if let Some(total) = total {
            let pages = total.div_ceil(u64::from(self.page_size)).max(1);
            self.last_page = Some(u32::try_from(pages).unwrap_or(u32::MAX));
        }
    }

    /// Classifies the rows of the current page and counts it as fetched
    pub fn check_page(&mut self, rows: &[ProductRecord]) -> PageCheck {
        self.pages_fetched += 1;
        self.attempts = 0;

        if rows.is_empty() {
            return PageCheck::Empty;
        }

        let identities = identity_set(rows);
        if !identities.is_empty() && identities == self.previous_identities {
            return PageCheck::Repeated;
        }

        PageCheck::Fresh
    }

    /// Accepts the current page and moves to the next one unless it was the last
    pub fn advance(&mut self, rows: &[ProductRecord]) -> Advance {
        if let Some(last) = self.last_page {
            if self.page >= last {
                return Advance::Finished;
            }
        }

        self.previous_identities = identity_set(rows);
        self.page += 1;
        self.attempts = 0;
        Advance::Next(self.page)
    }

    /// Records a retryable failure of the current page
    ///
    /// # Returns
    ///
    /// * `Some(Duration)` - Backoff to wait before the next attempt
    /// * `None` - The retry ceiling was reached
    pub fn register_failure(&mut self, max_retries: u32, base_delay: Duration) -> Option<Duration> {
        self.attempts += 1;

        if self.attempts >= max_retries {
            return None;
        }

        Some(base_delay * (self.attempts + 1))
    }
}

fn identity_set(rows: &[ProductRecord]) -> BTreeSet<String> {
    rows.iter()
        .filter_map(ProductRecord::identity)
        .map(str::to_string)
        .collect()
}
