//! Category descriptors and the discovery tree extractor

use crate::catalog::lenient;
use crate::HarvestError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// A flattened node of the retailer's category taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDescriptor {
    /// Opaque external key, e.g. `1_5`
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Empty for top-level nodes
    #[serde(default)]
    pub parent_id: String,

    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub level: Option<i64>,

    /// Slug used in browse URLs
    #[serde(rename = "url_friendly_name", default)]
    pub url_key: String,
}

impl CategoryDescriptor {
    /// Display name, falling back to the id when the name is blank
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// URL slug, falling back to the id when no slug was discovered
    pub fn url_part(&self) -> &str {
        if self.url_key.trim().is_empty() {
            &self.id
        } else {
            &self.url_key
        }
    }

    /// Prefix used in per-category log lines
    pub fn log_label(&self) -> String {
        format!("Category '{}' (ID: {})", self.display_name(), self.id)
    }
}

/// Flattens a category discovery response into descriptors
///
/// The response must carry a top-level `Categories` array. Nodes are visited
/// in pre-order; a node is emitted only when its `NodeId` is a string starting
/// with `prefix`, but the children of skipped nodes are still visited.
///
/// # Returns
///
/// * `Some(Vec<CategoryDescriptor>)` - Qualifying categories in pre-order
/// * `None` - The response does not have the expected shape
pub fn extract_categories(response: &Value, prefix: &str) -> Option<Vec<CategoryDescriptor>> {
    let roots = response.get("Categories")?.as_array()?;

    let mut categories = Vec::new();
    for root in roots {
        extract_node(root, prefix, &mut categories);
    }

    Some(categories)
}

fn extract_node(node: &Value, prefix: &str, out: &mut Vec<CategoryDescriptor>) {
    let node_id = node.get("NodeId").and_then(Value::as_str);

    if let Some(id) = node_id.filter(|id| id.starts_with(prefix)) {
        out.push(CategoryDescriptor {
            id: id.to_string(),
            name: text_field(node, "Description"),
            parent_id: text_field(node, "ParentNodeId"),
            level: node.get("NodeLevel").and_then(level_value),
            url_key: text_field(node, "UrlFriendlyName"),
        });
    }

    if let Some(children) = node.get("Children").and_then(Value::as_array) {
        for child in children {
            extract_node(child, prefix, out);
        }
    }
}

fn text_field(node: &Value, key: &str) -> String {
    match node.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn level_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Writes the discovered categories as a CSV table, replacing any existing file
pub fn save_categories(path: &Path, categories: &[CategoryDescriptor]) -> Result<(), HarvestError> {
    let mut writer = csv::Writer::from_path(path)?;
    for category in categories {
        writer.serialize(category)?;
    }
    writer.flush()?;
    Ok(())
}

/// Loads a category table written by [`save_categories`]
///
/// Rows that cannot be decoded or have no id are skipped with a warning.
/// A missing file is an error: crawling cannot start without it.
pub fn load_categories(path: &Path) -> Result<Vec<CategoryDescriptor>, HarvestError> {
    if !path.exists() {
        return Err(HarvestError::MissingInput(format!(
            "category table {} not found; run discovery first",
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut categories = Vec::new();

    for (index, row) in reader.deserialize::<CategoryDescriptor>().enumerate() {
        match row {
            Ok(category) if !category.id.trim().is_empty() => categories.push(category),
            Ok(_) => tracing::warn!("Skipping category row {} without an id", index + 1),
            Err(e) => tracing::warn!("Skipping unreadable category row {}: {}", index + 1, e),
        }
    }

    Ok(categories)
}
