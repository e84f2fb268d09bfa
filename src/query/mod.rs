//! Read-only browsing over the dedup artifacts
//!
//! `CatalogView` joins the unique products with the category mapping and
//! answers the questions a product chart needs: which products sit in a
//! category, how much protein and sugar they carry, and which dietary tags
//! exist at all.

use crate::catalog::{value_as_cell, CategoryForest, CategoryMappingRow, UniqueProductRecord};
use crate::config::OutputConfig;
use crate::HarvestError;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Nutrition key holding protein per 100g
pub const PROTEIN_KEY: &str = "Nutr_Protein_per_100g";

/// Nutrition key holding sugars per 100g
pub const SUGARS_KEY: &str = "Nutr_Sugars_per_100g";

/// One product as plotted on the protein/sugar chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    #[serde(rename = "Stockcode")]
    pub stockcode: String,

    #[serde(rename = "ProductName")]
    pub name: Option<String>,

    #[serde(rename = "Protein_per_g")]
    pub protein_per_g: f64,

    #[serde(rename = "Sugar_per_100g")]
    pub sugar_per_100g: f64,
}

/// Unique products joined with their category mapping
#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    products: Vec<UniqueProductRecord>,
    mapping: Vec<CategoryMappingRow>,

    /// Category id to the stockcodes mapped into it
    members: HashMap<String, HashSet<String>>,
}

impl CatalogView {
    pub fn new(products: Vec<UniqueProductRecord>, mapping: Vec<CategoryMappingRow>) -> Self {
        let mut members: HashMap<String, HashSet<String>> = HashMap::new();
        for row in &mapping {
            members
                .entry(row.category_id.clone())
                .or_default()
                .insert(row.stockcode.clone());
        }

        Self {
            products,
            mapping,
            members,
        }
    }

    /// Loads the unique products and category mapping written by deduplication
    ///
    /// Lines or rows that cannot be decoded are skipped with a warning.
    ///
    /// # Returns
    ///
    /// * `Ok(CatalogView)` - The loaded view
    /// * `Err(HarvestError)` - An input file is missing or unreadable
    pub fn load(config: &OutputConfig) -> Result<Self, HarvestError> {
        let products = load_unique_products(&config.unique_products_path())?;
        let mapping = load_mapping(&config.category_mapping_path())?;

        tracing::info!(
            "Loaded {} unique products and {} category mapping rows",
            products.len(),
            mapping.len()
        );

        Ok(Self::new(products, mapping))
    }

    pub fn products(&self) -> &[UniqueProductRecord] {
        &self.products
    }

    pub fn mapping(&self) -> &[CategoryMappingRow] {
        &self.mapping
    }

    /// Chart points for the products of one category
    ///
    /// # Arguments
    ///
    /// * `category_id` - The category to list, matched through the mapping table
    /// * `dietary` - Optional case-insensitive substring of the dietary statement
    ///
    /// # Returns
    ///
    /// Products in unique-product order that have both chart values. With a
    /// non-blank filter, products without a dietary statement are excluded.
    pub fn products_for_category(&self, category_id: &str, dietary: Option<&str>) -> Vec<ChartPoint> {
        let Some(stockcodes) = self.members.get(category_id) else {
            tracing::info!("No stockcodes found for category {}.", category_id);
            return Vec::new();
        };

        let filter = dietary
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty());

        let points: Vec<ChartPoint> = self
            .products
            .iter()
            .filter(|p| stockcodes.contains(&p.stockcode))
            .filter(|p| match &filter {
                Some(tag) => p
                    .product
                    .dietary_statement
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains(tag.as_str())),
                None => true,
            })
            .filter_map(|p| {
                Some(ChartPoint {
                    stockcode: p.stockcode.clone(),
                    name: p.product.name.clone(),
                    protein_per_g: protein_per_g(p)?,
                    sugar_per_100g: sugar_per_100g(p)?,
                })
            })
            .collect();

        tracing::info!(
            "Returning {} products for category {} (filter: {})",
            points.len(),
            category_id,
            filter.as_deref().unwrap_or("none")
        );

        points
    }

    /// Distinct dietary tags across all products, lower-cased and sorted
    pub fn dietary_tags(&self) -> Vec<String> {
        let tags: BTreeSet<String> = self
            .products
            .iter()
            .filter_map(|p| p.product.dietary_statement.as_deref())
            .flat_map(|statement| statement.split(','))
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();

        tags.into_iter().collect()
    }

    /// Category forest built from the mapping table
    pub fn forest(&self) -> CategoryForest {
        CategoryForest::from_mapping(&self.mapping)
    }
}

/// Protein per gram: protein per 100g divided by 100, rounded to 4 places
pub fn protein_per_g(product: &UniqueProductRecord) -> Option<f64> {
    let per_100g = nutrition_number(product, PROTEIN_KEY)?;
    Some((per_100g / 100.0 * 10_000.0).round() / 10_000.0)
}

pub fn sugar_per_100g(product: &UniqueProductRecord) -> Option<f64> {
    nutrition_number(product, SUGARS_KEY)
}

fn nutrition_number(product: &UniqueProductRecord, key: &str) -> Option<f64> {
    product
        .product
        .nutrition
        .get(key)
        .and_then(value_as_cell)
        .and_then(|text| clean_numeric(&text))
}

/// Parses a nutrition value after keeping only digits and periods
///
/// # Example
///
/// ```
/// use pantry_harvest::query::clean_numeric;
///
/// assert_eq!(clean_numeric("< 1.5g"), Some(1.5));
/// assert_eq!(clean_numeric("n/a"), None);
/// ```
pub fn clean_numeric(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    digits.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn load_unique_products(path: &Path) -> Result<Vec<UniqueProductRecord>, HarvestError> {
    if !path.exists() {
        return Err(HarvestError::MissingInput(format!(
            "unique products {} not found; run dedupe first",
            path.display()
        )));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut products = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<UniqueProductRecord>(&line) {
            Ok(product) => products.push(product),
            Err(e) => tracing::warn!("Skipping unique product line {}: {}", index + 1, e),
        }
    }

    Ok(products)
}

fn load_mapping(path: &Path) -> Result<Vec<CategoryMappingRow>, HarvestError> {
    if !path.exists() {
        return Err(HarvestError::MissingInput(format!(
            "category mapping {} not found; run dedupe first",
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();

    for (index, row) in reader.deserialize::<CategoryMappingRow>().enumerate() {
        match row {
            Ok(row) => rows.push(row),
            Err(e) => tracing::warn!("Skipping mapping row {}: {}", index + 1, e),
        }
    }

    Ok(rows)
}
