//! Output module for the product logs and run statistics
//!
//! This module handles:
//! - Appending crawl batches to the CSV and JSONL product logs
//! - Keeping the CSV column layout stable across batches and runs
//! - Recording and printing run statistics

mod csv_sink;
mod jsonl_sink;
pub mod stats;
mod traits;
mod writer;

pub use csv_sink::{column_layout, dropped_keys, CsvSink, PREFERRED_NUTRITION_COLUMNS};
pub use jsonl_sink::JsonlSink;
pub use stats::{print_summary, RunSummary};
pub use traits::{BatchReport, BatchSink, OutputError, OutputResult};
pub use writer::IncrementalWriter;
