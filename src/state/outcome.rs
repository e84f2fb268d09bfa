/// Category crawl outcome definitions
///
/// A category crawl never fails past its own boundary; it ends in one of the
/// outcomes below and hands back whatever rows it gathered.
use crate::catalog::{CategoryDescriptor, ProductRecord};
use std::fmt;

/// How a category crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlOutcome {
    /// The category was exhausted: empty page, repeated page, or last page reached
    Done,

    /// Retries ran out, the response was malformed, or the request was rejected
    Failed,

    /// The page cap for the run mode was reached
    SafetyStopped,
}

impl CrawlOutcome {
    /// Returns true if the category was read to its end
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns true if the category ended because of an error
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Failed => "failed",
            Self::SafetyStopped => "safety_stopped",
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::Done, Self::Failed, Self::SafetyStopped]
    }
}

impl fmt::Display for CrawlOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rows and outcome of one category crawl
#[derive(Debug, Clone)]
pub struct CategoryCrawlResult {
    pub category: CategoryDescriptor,

    /// Product sightings in page-ascending order
    pub rows: Vec<ProductRecord>,

    pub outcome: CrawlOutcome,

    /// Pages that returned a decodable listing
    pub pages_fetched: u32,
}

impl CategoryCrawlResult {
    pub fn new(
        category: CategoryDescriptor,
        rows: Vec<ProductRecord>,
        outcome: CrawlOutcome,
        pages_fetched: u32,
    ) -> Self {
        Self {
            category,
            rows,
            outcome,
            pages_fetched,
        }
    }

    /// A result with no rows, used when a crawl could not even start
    pub fn empty(category: CategoryDescriptor, outcome: CrawlOutcome) -> Self {
        Self::new(category, Vec::new(), outcome, 0)
    }
}
