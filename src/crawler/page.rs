//! Browse endpoint wire format
//!
//! - `BrowseRequest`: the JSON payload posted for one listing page
//! - `ListingPage`: the products and total-count hint decoded from a response
//! - `product_row`: flattens one API product into a `ProductRecord`

use crate::catalog::{parse_nutrition, CategoryDescriptor, ProductRecord};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Payload of a category browse request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseRequest {
    pub category_id: String,
    pub page_number: u32,
    pub page_size: u32,
    pub sort_type: &'static str,
    pub url: String,
    pub location: String,
    /// JSON document serialized into a string, as the endpoint expects
    pub format_object: String,
    pub category_version: &'static str,
    pub enable_ad_re_ranking: bool,
    pub filters: Vec<Value>,
    pub flags: Value,
    pub gp_boost: u32,
    pub group_edm_variants: bool,
    pub is_bundle: bool,
    pub is_hide_unavailable_products: bool,
    pub is_mobile: bool,
    pub is_registered_reward_card_promotion: bool,
    pub is_special: bool,
    pub token: String,
}

impl BrowseRequest {
    /// Builds the payload for one page of a category
    ///
    /// # Arguments
    ///
    /// * `category` - The category being crawled
    /// * `browse_path` - Site path of the category's browse page
    /// * `page_number` - 1-based page number
    /// * `page_size` - Products per page
    pub fn new(category: &CategoryDescriptor, browse_path: &str, page_number: u32, page_size: u32) -> Self {
        Self {
            category_id: category.id.clone(),
            page_number,
            page_size,
            sort_type: "TraderRelevance",
            url: browse_path.to_string(),
            location: browse_path.to_string(),
            format_object: json!({ "name": category.display_name() }).to_string(),
            category_version: "v2",
            enable_ad_re_ranking: false,
            filters: Vec::new(),
            flags: json!({ "EnablePersonalizationCategoryRestriction": true }),
            gp_boost: 0,
            group_edm_variants: false,
            is_bundle: false,
            is_hide_unavailable_products: false,
            is_mobile: false,
            is_registered_reward_card_promotion: false,
            is_special: false,
            token: String::new(),
        }
    }
}

/// A decoded listing page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Raw product objects from every bundle, in response order
    pub products: Vec<Map<String, Value>>,

    /// Total number of products in the category, when the API reports it
    pub total: Option<u64>,
}

/// Why a response body could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The body is not JSON
    Undecodable(String),

    /// The body is JSON but not an object
    UnexpectedShape,
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undecodable(e) => write!(f, "JSON decode error: {}", e),
            Self::UnexpectedShape => write!(f, "response is not a JSON object"),
        }
    }
}

impl ListingPage {
    /// Decodes a browse response body
    ///
    /// A response without a `Bundles` array is treated as an empty page.
    pub fn parse(body: &str) -> Result<Self, PageError> {
        let data: Value =
            serde_json::from_str(body).map_err(|e| PageError::Undecodable(e.to_string()))?;
        let data = data.as_object().ok_or(PageError::UnexpectedShape)?;

        let products = data
            .get("Bundles")
            .and_then(Value::as_array)
            .map(|bundles| {
                bundles
                    .iter()
                    .filter_map(|bundle| bundle.get("Products").and_then(Value::as_array))
                    .flatten()
                    .filter_map(|product| product.as_object().cloned())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            products,
            total: total_hint(data),
        })
    }
}

/// Reads the total-count hint: `TotalRecordCount`, else `Pagination.TotalItems`,
/// else `Pagination.TotalRecordCount`
///
/// The first key present decides; a present value that is not a non-negative
/// integer means no hint.
fn total_hint(data: &Map<String, Value>) -> Option<u64> {
    let pagination = data.get("Pagination").and_then(Value::as_object);

    let value = data
        .get("TotalRecordCount")
        .filter(|v| !v.is_null())
        .or_else(|| {
            pagination.and_then(|p| {
                p.get("TotalItems")
                    .filter(|v| !v.is_null())
                    .or_else(|| p.get("TotalRecordCount"))
            })
        })?;

    match value.as_u64() {
        Some(total) => Some(total),
        None => {
            tracing::warn!("Invalid total count value: {}", value);
            None
        }
    }
}

/// Flattens one API product into a sighting for `category`
pub fn product_row(product: &Map<String, Value>, category: &CategoryDescriptor, site_root: &str) -> ProductRecord {
    let empty = Map::new();
    let attributes = product
        .get("AdditionalAttributes")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let attr = |key: &str| attributes.get(key).and_then(text);

    let stockcode = product.get("Stockcode").and_then(text);
    let url = match (&stockcode, product.get("UrlFriendlyName").and_then(text)) {
        (Some(code), Some(slug)) if !code.is_empty() && !slug.is_empty() => {
            Some(format!("{}/shop/productdetails/{}/{}", site_root, code, slug))
        }
        _ => None,
    };

    let nutrition = attributes
        .get("nutritionalinformation")
        .and_then(Value::as_str)
        .map(parse_nutrition)
        .unwrap_or_default();

    ProductRecord {
        name: product
            .get("DisplayName")
            .and_then(text)
            .or_else(|| product.get("Name").and_then(text)),
        brand: product.get("Brand").and_then(text),
        price: product.get("Price").and_then(Value::as_f64),
        cup_string: product.get("CupString").and_then(text),
        package_size: product.get("PackageSize").and_then(text),
        url,
        category_id: Some(category.id.clone()),
        category_name: Some(category.display_name().to_string()),
        category_parent_id: Some(category.parent_id.clone()).filter(|p| !p.is_empty()),
        category_level: category.level,
        ingredients: attr("ingredients"),
        allergy_statement: attr("allergystatement"),
        allergen_may_be_present: attr("allergenmaybepresent"),
        lifestyle_claim: attr("lifestyleclaim"),
        dietary_statement: attr("lifestyleanddietarystatement"),
        health_star_rating: attr("healthstarrating"),
        contains_gluten: attr("containsgluten"),
        contains_nuts: attr("containsnuts"),
        stockcode,
        nutrition,
    }
}

/// Scalar JSON values as text; null, arrays and objects are absent
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
