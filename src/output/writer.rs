//! Incremental two-sink writer
//!
//! Every completed category batch goes to both sinks. A failure in one sink
//! is logged and does not stop the other; the run always continues.

use crate::catalog::ProductRecord;
use crate::output::csv_sink::CsvSink;
use crate::output::jsonl_sink::JsonlSink;
use crate::output::traits::{BatchReport, BatchSink, OutputResult};
use std::path::Path;

/// Writer owned by the scheduler's completion loop
#[derive(Debug)]
pub struct IncrementalWriter {
    csv: CsvSink,
    jsonl: JsonlSink,
}

impl IncrementalWriter {
    /// Opens both sinks
    ///
    /// # Arguments
    ///
    /// * `csv_path` - Tabular product log
    /// * `jsonl_path` - Line-delimited JSON product log
    ///
    /// # Returns
    ///
    /// * `Ok(IncrementalWriter)` - Ready to append
    /// * `Err(OutputError)` - An existing CSV file could not be read back
    pub fn open(csv_path: &Path, jsonl_path: &Path) -> OutputResult<Self> {
        Ok(Self {
            csv: CsvSink::open(csv_path)?,
            jsonl: JsonlSink::open(jsonl_path),
        })
    }

    /// Appends one batch to both sinks
    pub fn append_batch(&mut self, rows: &[ProductRecord]) -> BatchReport {
        if rows.is_empty() {
            tracing::info!("No new data to save.");
            return BatchReport {
                rows: 0,
                csv_written: true,
                jsonl_written: true,
            };
        }

        tracing::info!(
            "Appending {} products to {} and {}...",
            rows.len(),
            self.csv.path().display(),
            self.jsonl.path().display()
        );

        BatchReport {
            rows: rows.len(),
            csv_written: write_to(&mut self.csv, rows),
            jsonl_written: write_to(&mut self.jsonl, rows),
        }
    }

    pub fn csv_header_written(&self) -> bool {
        self.csv.header_written()
    }
}

fn write_to(sink: &mut dyn BatchSink, rows: &[ProductRecord]) -> bool {
    match sink.append(rows) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                "Failed to save {} batch to {}: {}",
                sink.name(),
                sink.path().display(),
                e
            );
            false
        }
    }
}
