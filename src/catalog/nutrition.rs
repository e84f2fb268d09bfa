//! Nutrition panel parsing
//!
//! Products carry their nutrition information panel as a JSON string of the
//! form `{"Attributes": [{"Name": "...", "Value": ...}]}`. Each attribute is
//! flattened into a `Nutr_*` key.

use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix applied to every normalized nutrition key
pub const NUTRITION_PREFIX: &str = "Nutr_";

/// Parses a serialized nutrition panel into normalized fields
///
/// Malformed input (not JSON, no attribute list, attributes of the wrong
/// shape) yields an empty map or skips the bad entries. This function never
/// fails.
///
/// # Example
///
/// ```
/// use pantry_harvest::catalog::parse_nutrition;
///
/// let raw = r#"{"Attributes":[{"Name":"Protein - Total - NIP Quantity Per 100g","Value":"7.1"}]}"#;
/// let fields = parse_nutrition(raw);
/// assert_eq!(fields["Nutr_Protein_per_100g"], "7.1");
/// ```
pub fn parse_nutrition(raw: &str) -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();

    let panel: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            let preview: String = raw.chars().take(50).collect();
            tracing::debug!("Unparseable nutrition panel ({}): {}...", e, preview);
            return fields;
        }
    };

    let Some(attributes) = panel.get("Attributes").and_then(Value::as_array) else {
        return fields;
    };

    for attribute in attributes {
        let name = attribute.get("Name").and_then(Value::as_str);
        let value = attribute.get("Value").filter(|v| !v.is_null());

        if let (Some(name), Some(value)) = (name, value) {
            if name.is_empty() {
                continue;
            }
            fields.insert(normalize_nutrient_name(name), value.clone());
        }
    }

    fields
}

/// Normalizes a raw attribute name into a `Nutr_*` key
///
/// The rewrites are applied in a fixed order and are case-sensitive:
/// the total-NIP suffix is dropped, per-100g and per-serve qualifiers become
/// `_per_100g` / `_per_Serve`, leftover "Quantity" wording is dropped, and
/// spaces, periods, hyphens and parentheses are collapsed out.
pub fn normalize_nutrient_name(raw: &str) -> String {
    let clean = raw
        .replace(" - Total - NIP", "")
        .replace(" Quantity Per 100g", "_per_100g")
        .replace(" Quantity Per Serve", "_per_Serve")
        .replace(" Quantity", "")
        .replace(' ', "_")
        .replace('.', "")
        .replace('-', "_")
        .replace(['(', ')'], "");

    format!("{}{}", NUTRITION_PREFIX, clean)
}
