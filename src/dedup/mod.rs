//! Deduplication of the product log
//!
//! Collapses every sighting of a product into one record carrying all the
//! categories it was seen in, and derives the category mapping table and the
//! unique stockcode list from the same pass.
//!
//! - `read_product_log`: line-by-line JSONL reader that skips malformed lines
//! - `deduplicate`: the pure grouping step
//! - `write_outputs`: writes the three dedup artifacts
//! - `run_dedup`: all of the above for one input file
//!
//! Running it twice on the same input produces byte-identical files.

use crate::catalog::{CategoryMappingRow, CategoryMembership, ProductRecord, UniqueProductRecord};
use crate::config::OutputConfig;
use crate::HarvestError;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Grouped result of one dedup pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutput {
    /// One record per stockcode, in first-seen order
    pub products: Vec<UniqueProductRecord>,

    /// One row per distinct (stockcode, category id)
    pub mapping: Vec<CategoryMappingRow>,

    /// Sightings dropped for lacking a stockcode
    pub missing_stockcode: usize,
}

/// Counts reported by [`run_dedup`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub records_read: usize,
    pub malformed_lines: usize,
    pub missing_stockcode: usize,
    pub unique_products: usize,
    pub mapping_rows: usize,
}

#[derive(Serialize)]
struct StockcodeRow<'a> {
    #[serde(rename = "Stockcode")]
    stockcode: &'a str,
}

/// Reads a JSONL product log
///
/// Blank lines are ignored. Lines that are not a JSON object are skipped and
/// counted.
///
/// # Returns
///
/// * `Ok((records, malformed))` - Decoded sightings in file order and the number of skipped lines
/// * `Err(HarvestError)` - The file is missing or cannot be read
pub fn read_product_log(path: &Path) -> Result<(Vec<ProductRecord>, usize), HarvestError> {
    if !path.exists() {
        return Err(HarvestError::MissingInput(format!(
            "product log {} not found",
            path.display()
        )));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut malformed = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ProductRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                malformed += 1;
                tracing::warn!("Skipping malformed line {}: {}", index + 1, e);
            }
        }
    }

    if malformed > 0 {
        tracing::warn!("Skipped {} malformed lines in {}", malformed, path.display());
    }

    Ok((records, malformed))
}

/// Groups sightings by stockcode
///
/// The first sighting of a stockcode is its representative; later sightings
/// only add category memberships. Memberships keep first-seen order and
/// repeat only when some field differs.
pub fn deduplicate(records: Vec<ProductRecord>) -> DedupOutput {
    let mut output = DedupOutput::default();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut seen_memberships: Vec<HashSet<CategoryMembership>> = Vec::new();
    let mut seen_mappings: HashSet<(String, String)> = HashSet::new();

    for record in records {
        let Some(stockcode) = record.identity().map(str::to_string) else {
            output.missing_stockcode += 1;
            continue;
        };

        let membership = CategoryMembership::from_record(&record);

        let position = match positions.get(&stockcode) {
            Some(&position) => position,
            None => {
                positions.insert(stockcode.clone(), output.products.len());
                output.products.push(UniqueProductRecord {
                    stockcode: stockcode.clone(),
                    product: record.without_category(),
                    categories: Vec::new(),
                });
                seen_memberships.push(HashSet::new());
                output.products.len() - 1
            }
        };

        if !membership.category_id.is_empty()
            && seen_mappings.insert((stockcode.clone(), membership.category_id.clone()))
        {
            output.mapping.push(CategoryMappingRow::new(&stockcode, &membership));
        }

        if seen_memberships[position].insert(membership.clone()) {
            output.products[position].categories.push(membership);
        }
    }

    if output.missing_stockcode > 0 {
        tracing::warn!(
            "Dropped {} records with missing Stockcode.",
            output.missing_stockcode
        );
    }

    output
}

/// Writes the unique products, category mapping and stockcode list
///
/// Existing files are replaced.
pub fn write_outputs(output: &DedupOutput, config: &OutputConfig) -> Result<(), HarvestError> {
    let products_path = config.unique_products_path();
    let mut products = BufWriter::new(File::create(&products_path)?);
    for product in &output.products {
        serde_json::to_writer(&mut products, product)?;
        products.write_all(b"\n")?;
    }
    products.flush()?;
    tracing::info!(
        "Saved {} unique products to {}",
        output.products.len(),
        products_path.display()
    );

    let mapping_path = config.category_mapping_path();
    let mut mapping = csv::Writer::from_path(&mapping_path)?;
    if output.mapping.is_empty() {
        mapping.write_record([
            "Stockcode",
            "ScrapedCategoryID",
            "ScrapedCategoryName",
            "ScrapedCategoryParentID",
            "ScrapedCategoryLevel",
        ])?;
    }
    for row in &output.mapping {
        mapping.serialize(row)?;
    }
    mapping.flush()?;
    tracing::info!(
        "Saved {} category-stockcode mappings to {}",
        output.mapping.len(),
        mapping_path.display()
    );

    let stockcodes_path = config.unique_stockcodes_path();
    let mut stockcodes = csv::Writer::from_path(&stockcodes_path)?;
    if output.products.is_empty() {
        stockcodes.write_record(["Stockcode"])?;
    }
    for product in &output.products {
        stockcodes.serialize(StockcodeRow {
            stockcode: &product.stockcode,
        })?;
    }
    stockcodes.flush()?;
    tracing::info!(
        "Saved {} unique stockcodes for re-scraping to {}",
        output.products.len(),
        stockcodes_path.display()
    );

    Ok(())
}

/// Deduplicates the product log at `input` into the configured output files
pub fn run_dedup(config: &OutputConfig, input: &Path) -> Result<DedupReport, HarvestError> {
    tracing::info!("Loading potentially duplicated data from {}", input.display());

    let (records, malformed_lines) = read_product_log(input)?;
    let records_read = records.len();
    tracing::info!("Loaded {} records.", records_read);

    let output = deduplicate(records);
    tracing::info!("Generated {} unique product records.", output.products.len());

    write_outputs(&output, config)?;

    Ok(DedupReport {
        records_read,
        malformed_lines,
        missing_stockcode: output.missing_stockcode,
        unique_products: output.products.len(),
        mapping_rows: output.mapping.len(),
    })
}
