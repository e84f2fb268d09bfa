//! Output sink traits and types
//!
//! This module defines the trait interface for append-only product sinks and
//! the report returned for each written batch.

use crate::catalog::ProductRecord;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Trait for append-only product sinks
///
/// A sink owns one output file. Each call appends a whole batch; a failed
/// call leaves the sink usable for the next batch.
pub trait BatchSink {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// The file this sink appends to
    fn path(&self) -> &Path;

    /// Appends one batch of product sightings
    ///
    /// # Arguments
    ///
    /// * `rows` - The sightings to append, in order
    fn append(&mut self, rows: &[ProductRecord]) -> OutputResult<()>;
}

/// What happened to one batch handed to the writer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Rows in the batch
    pub rows: usize,

    /// Whether the CSV sink accepted the batch
    pub csv_written: bool,

    /// Whether the JSONL sink accepted the batch
    pub jsonl_written: bool,
}

impl BatchReport {
    /// Returns true if every sink accepted the batch
    pub fn is_complete(&self) -> bool {
        self.csv_written && self.jsonl_written
    }

    /// Number of sinks that rejected the batch
    pub fn failed_sinks(&self) -> usize {
        usize::from(!self.csv_written) + usize::from(!self.jsonl_written)
    }
}
