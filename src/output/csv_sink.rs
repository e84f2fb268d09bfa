//! Append-only CSV product log
//!
//! The column layout is fixed once: when the header is first written, or,
//! when appending to a file from an earlier run, read back from that file's
//! header. Every later batch is projected onto the same layout.

use crate::catalog::{ProductRecord, CORE_COLUMNS};
use crate::output::traits::{BatchSink, OutputResult};
use std::collections::{BTreeSet, HashSet};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Nutrition columns placed right after the core columns, in this order
///
/// Names are as produced by `normalize_nutrient_name` for the retailer's
/// nutrition panel, so a first batch without nutrition still lays out the
/// columns later batches need.
pub const PREFERRED_NUTRITION_COLUMNS: &[&str] = &[
    "Nutr_Serving_Size",
    "Nutr_Servings_Per_Pack",
    "Nutr_Energy_per_100g",
    "Nutr_Energy_per_Serve",
    "Nutr_Protein_per_100g",
    "Nutr_Protein_per_Serve",
    "Nutr_Fat_Total_per_100g",
    "Nutr_Fat_Total_per_Serve",
    "Nutr_Fat_Saturated_per_100g",
    "Nutr_Fat_Saturated_per_Serve",
    "Nutr_Carbohydrate_per_100g",
    "Nutr_Carbohydrate_per_Serve",
    "Nutr_Sugars_per_100g",
    "Nutr_Sugars_per_Serve",
    "Nutr_Sodium_per_100g",
    "Nutr_Sodium_per_Serve",
    "Nutr_Dietary_Fibre_per_100g",
    "Nutr_Dietary_Fibre_per_Serve",
];

/// Column layout for a first batch
///
/// Core columns, then the preferred nutrition columns, then every other key
/// found in the batch in sorted order.
pub fn column_layout(rows: &[ProductRecord]) -> Vec<String> {
    let fixed: BTreeSet<&str> = CORE_COLUMNS
        .iter()
        .chain(PREFERRED_NUTRITION_COLUMNS)
        .copied()
        .collect();

    let extras: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.nutrition.keys())
        .map(String::as_str)
        .filter(|key| !fixed.contains(key))
        .collect();

    CORE_COLUMNS
        .iter()
        .chain(PREFERRED_NUTRITION_COLUMNS)
        .copied()
        .chain(extras)
        .map(str::to_string)
        .collect()
}

/// CSV sink with a write-once header
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,

    /// Set once the header exists on disk
    layout: Option<Vec<String>>,
}

impl CsvSink {
    /// Opens a sink on `path`, adopting the header of an existing file
    pub fn open(path: &Path) -> OutputResult<Self> {
        let layout = existing_header(path)?;
        if let Some(columns) = &layout {
            tracing::info!(
                "Appending to existing {} ({} columns)",
                path.display(),
                columns.len()
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            layout,
        })
    }

    pub fn header_written(&self) -> bool {
        self.layout.is_some()
    }

    pub fn layout(&self) -> Option<&[String]> {
        self.layout.as_deref()
    }
}

fn existing_header(path: &Path) -> OutputResult<Option<Vec<String>>> {
    let non_empty = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    if !non_empty {
        return Ok(None);
    }

    let mut reader = csv::Reader::from_path(path)?;
    let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    Ok(Some(header).filter(|h| !h.is_empty()))
}

impl BatchSink for CsvSink {
    fn name(&self) -> &'static str {
        "CSV"
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, rows: &[ProductRecord]) -> OutputResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        // Another writer (or an earlier failed batch) may have put a header on disk
        let (layout, write_header) = match self.layout.clone() {
            Some(layout) => (layout, false),
            None => match existing_header(&self.path)? {
                Some(layout) => (layout, false),
                None => (column_layout(rows), true),
            },
        };

        warn_dropped_keys(&self.path, &layout, rows);

        let written = write_rows(&self.path, &layout, write_header, rows);
        self.layout = match &written {
            Err(_) if write_header => existing_header(&self.path).ok().flatten(),
            _ => Some(layout),
        };

        written
    }
}

fn write_rows(path: &Path, layout: &[String], write_header: bool, rows: &[ProductRecord]) -> OutputResult<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if write_header {
        writer.write_record(layout)?;
    }

    for row in rows {
        writer.write_record(layout.iter().map(|column| row.cell(column).unwrap_or_default()))?;
    }
    writer.flush()?;

    Ok(())
}

/// Nutrition keys of `rows` that the layout has no column for
pub fn dropped_keys<'a>(layout: &[String], rows: &'a [ProductRecord]) -> BTreeSet<&'a str> {
    let columns: HashSet<&str> = layout.iter().map(String::as_str).collect();

    rows.iter()
        .flat_map(|row| row.nutrition.keys())
        .map(String::as_str)
        .filter(|key| !columns.contains(key))
        .collect()
}

fn warn_dropped_keys(path: &Path, layout: &[String], rows: &[ProductRecord]) {
    let dropped = dropped_keys(layout, rows);
    if !dropped.is_empty() {
        let keys: Vec<&str> = dropped.into_iter().collect();
        tracing::warn!(
            "{} has no column for {}; these values are kept in the JSONL log only",
            path.display(),
            keys.join(", ")
        );
    }
}
