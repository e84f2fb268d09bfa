//! Catalog data model
//!
//! This module holds the records the harvester produces and consumes:
//! - `CategoryDescriptor`: a flattened taxonomy node and the discovery extractor
//! - `ProductRecord`: one product sighting with its nutrition fields
//! - `UniqueProductRecord`: one product after deduplication
//! - `CategoryForest`: the category hierarchy as an index arena

mod category;
mod hierarchy;
pub mod lenient;
mod nutrition;
mod product;

pub use category::{extract_categories, load_categories, save_categories, CategoryDescriptor};
pub use hierarchy::{CategoryForest, CategoryNode, CategoryTreeView};
pub use nutrition::{normalize_nutrient_name, parse_nutrition, NUTRITION_PREFIX};
pub use product::{
    value_as_cell, CategoryMappingRow, CategoryMembership, ProductRecord, UniqueProductRecord,
    CORE_COLUMNS,
};
