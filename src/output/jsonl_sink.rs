//! Append-only JSONL product log
//!
//! One JSON object per line. Absent fields are omitted and every nutrition
//! key is kept, so this log is the lossless input of deduplication.

use crate::catalog::ProductRecord;
use crate::output::traits::{BatchSink, OutputResult};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl BatchSink for JsonlSink {
    fn name(&self) -> &'static str {
        "JSONL"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, rows: &[ProductRecord]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        // Serialize the whole batch first so a bad row cannot leave half a batch behind
        let mut buffer = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buffer, row)?;
            buffer.push(b'\n');
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&buffer)?;
        writer.flush()?;

        Ok(())
    }
}
