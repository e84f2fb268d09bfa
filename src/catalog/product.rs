//! Product sighting and unique product records

use crate::catalog::lenient::{self, format_number};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Column names of the fixed record schema, in output order
pub const CORE_COLUMNS: &[&str] = &[
    "Stockcode",
    "ProductName",
    "Brand",
    "Price",
    "CupString",
    "PackageSize",
    "ProductURL",
    "ScrapedCategoryID",
    "ScrapedCategoryName",
    "ScrapedCategoryParentID",
    "ScrapedCategoryLevel",
    "Ingredients",
    "AllergyStatement",
    "AllergenMayBePresent",
    "LifestyleClaim",
    "LifestyleAndDietaryStatement",
    "HealthStarRating",
    "ContainsGluten",
    "ContainsNuts",
];

/// One sighting of a product while crawling one category page
///
/// The fixed fields cover everything the retailer reliably returns. Nutrition
/// panels vary per product, so their normalized `Nutr_*` keys live in the open
/// `nutrition` map and are flattened into the serialized record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(
        rename = "Stockcode",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub stockcode: Option<String>,

    #[serde(
        rename = "ProductName",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub name: Option<String>,

    #[serde(
        rename = "Brand",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub brand: Option<String>,

    #[serde(
        rename = "Price",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_f64"
    )]
    pub price: Option<f64>,

    #[serde(
        rename = "CupString",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub cup_string: Option<String>,

    #[serde(
        rename = "PackageSize",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub package_size: Option<String>,

    #[serde(
        rename = "ProductURL",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub url: Option<String>,

    #[serde(
        rename = "ScrapedCategoryID",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub category_id: Option<String>,

    #[serde(
        rename = "ScrapedCategoryName",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub category_name: Option<String>,

    #[serde(
        rename = "ScrapedCategoryParentID",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub category_parent_id: Option<String>,

    #[serde(
        rename = "ScrapedCategoryLevel",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_i64"
    )]
    pub category_level: Option<i64>,

    #[serde(
        rename = "Ingredients",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub ingredients: Option<String>,

    #[serde(
        rename = "AllergyStatement",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub allergy_statement: Option<String>,

    #[serde(
        rename = "AllergenMayBePresent",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub allergen_may_be_present: Option<String>,

    #[serde(
        rename = "LifestyleClaim",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub lifestyle_claim: Option<String>,

    #[serde(
        rename = "LifestyleAndDietaryStatement",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub dietary_statement: Option<String>,

    #[serde(
        rename = "HealthStarRating",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub health_star_rating: Option<String>,

    #[serde(
        rename = "ContainsGluten",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub contains_gluten: Option<String>,

    #[serde(
        rename = "ContainsNuts",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub contains_nuts: Option<String>,

    /// Normalized nutrition fields (`Nutr_*`) and any other unanticipated keys
    #[serde(flatten)]
    pub nutrition: BTreeMap<String, Value>,
}

impl ProductRecord {
    /// Returns the stockcode if it is present and not blank
    pub fn identity(&self) -> Option<&str> {
        self.stockcode
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Renders one column of this record as a CSV cell
    ///
    /// Returns `None` for absent values so the caller can write an empty cell.
    pub fn cell(&self, column: &str) -> Option<String> {
        let text = |field: &Option<String>| field.clone();

        match column {
            "Stockcode" => text(&self.stockcode),
            "ProductName" => text(&self.name),
            "Brand" => text(&self.brand),
            "Price" => self.price.map(format_number),
            "CupString" => text(&self.cup_string),
            "PackageSize" => text(&self.package_size),
            "ProductURL" => text(&self.url),
            "ScrapedCategoryID" => text(&self.category_id),
            "ScrapedCategoryName" => text(&self.category_name),
            "ScrapedCategoryParentID" => text(&self.category_parent_id),
            "ScrapedCategoryLevel" => self.category_level.map(|l| l.to_string()),
            "Ingredients" => text(&self.ingredients),
            "AllergyStatement" => text(&self.allergy_statement),
            "AllergenMayBePresent" => text(&self.allergen_may_be_present),
            "LifestyleClaim" => text(&self.lifestyle_claim),
            "LifestyleAndDietaryStatement" => text(&self.dietary_statement),
            "HealthStarRating" => text(&self.health_star_rating),
            "ContainsGluten" => text(&self.contains_gluten),
            "ContainsNuts" => text(&self.contains_nuts),
            other => self.nutrition.get(other).and_then(value_as_cell),
        }
    }

    /// Returns a copy with the identity and category columns cleared
    ///
    /// Used as the representative body of a unique product, whose categories
    /// are carried separately.
    pub fn without_category(&self) -> Self {
        Self {
            stockcode: None,
            category_id: None,
            category_name: None,
            category_parent_id: None,
            category_level: None,
            ..self.clone()
        }
    }
}

/// Renders an extension value as text; null stays absent
pub fn value_as_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// One category a product was sighted in
///
/// All four values are kept as text; missing values are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryMembership {
    #[serde(rename = "ScrapedCategoryID", default)]
    pub category_id: String,

    #[serde(rename = "ScrapedCategoryName", default)]
    pub category_name: String,

    #[serde(rename = "ScrapedCategoryParentID", default)]
    pub category_parent_id: String,

    #[serde(rename = "ScrapedCategoryLevel", default)]
    pub category_level: String,
}

impl CategoryMembership {
    pub fn from_record(record: &ProductRecord) -> Self {
        Self {
            category_id: record.category_id.clone().unwrap_or_default(),
            category_name: record.category_name.clone().unwrap_or_default(),
            category_parent_id: record.category_parent_id.clone().unwrap_or_default(),
            category_level: record
                .category_level
                .map(|l| l.to_string())
                .unwrap_or_default(),
        }
    }
}

/// One product after deduplication, with every category it was seen in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueProductRecord {
    #[serde(rename = "Stockcode", deserialize_with = "lenient::string")]
    pub stockcode: String,

    /// Fields of the first sighting, without identity and category columns
    #[serde(flatten)]
    pub product: ProductRecord,

    #[serde(rename = "All_Categories_Info", default)]
    pub categories: Vec<CategoryMembership>,
}

/// One (stockcode, category) row of the category mapping table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMappingRow {
    #[serde(rename = "Stockcode")]
    pub stockcode: String,

    #[serde(rename = "ScrapedCategoryID")]
    pub category_id: String,

    #[serde(rename = "ScrapedCategoryName", default)]
    pub category_name: String,

    #[serde(rename = "ScrapedCategoryParentID", default)]
    pub category_parent_id: String,

    #[serde(rename = "ScrapedCategoryLevel", default)]
    pub category_level: String,
}

impl CategoryMappingRow {
    pub fn new(stockcode: &str, membership: &CategoryMembership) -> Self {
        Self {
            stockcode: stockcode.to_string(),
            category_id: membership.category_id.clone(),
            category_name: membership.category_name.clone(),
            category_parent_id: membership.category_parent_id.clone(),
            category_level: membership.category_level.clone(),
        }
    }
}
