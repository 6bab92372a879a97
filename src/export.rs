//! Sheet export formats.
//!
//! - `prestashop`: the flat catalog record stored under
//!   `export_data.prestashop_format`, ready for a PrestaShop CSV/API import.
//! - `json`: the whole sheet, unchanged.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CatalogError;
use crate::models::{Product, ProductSheet};

/// Key under `export_data` holding the PrestaShop record.
pub const PRESTASHOP_KEY: &str = "prestashop_format";

const PRESTASHOP_INSTRUCTIONS: &str = "Importez ces données dans PrestaShop via CSV ou API";

/// Flat PrestaShop product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrestashopRecord {
    pub name: String,
    pub reference: String,
    pub price: f64,
    pub description: String,
    pub meta_title: String,
    pub meta_description: String,
    pub categories: Vec<String>,
    pub brand: String,
    pub ean13: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Prestashop,
    Json,
}

impl FromStr for ExportFormat {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prestashop" => Ok(ExportFormat::Prestashop),
            "json" => Ok(ExportFormat::Json),
            other => Err(CatalogError::UnsupportedFormat(format!(
                "'{}' (expected prestashop or json)",
                other
            ))),
        }
    }
}

/// Force the identity fields of a provider-written export payload to match
/// the product. The EAN and brand always come from the product record.
pub fn pin_prestashop_identity(export_data: &mut serde_json::Map<String, Value>, product: &Product) {
    let entry = export_data
        .entry(PRESTASHOP_KEY.to_string())
        .or_insert_with(|| json!({}));
    if !entry.is_object() {
        *entry = json!({});
    }
    if let Some(record) = entry.as_object_mut() {
        record.insert("ean13".to_string(), json!(product.ean_code));
        record.insert("brand".to_string(), json!(product.brand));
        record
            .entry("categories".to_string())
            .or_insert_with(|| json!([product.category]));
    }
}

/// The stored PrestaShop record of a sheet, if it is well formed.
pub fn prestashop_record(sheet: &ProductSheet) -> Option<PrestashopRecord> {
    sheet
        .export_data
        .get(PRESTASHOP_KEY)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Render a sheet in the requested format.
pub fn export_sheet(sheet: &ProductSheet, format: ExportFormat) -> Value {
    match format {
        ExportFormat::Prestashop => json!({
            "format": "prestashop",
            "data": sheet.export_data.get(PRESTASHOP_KEY).cloned().unwrap_or_else(|| json!({})),
            "instructions": PRESTASHOP_INSTRUCTIONS,
        }),
        ExportFormat::Json => json!({ "format": "json", "data": sheet }),
    }
}
