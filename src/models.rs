//! Core data models used throughout the product-sheet generator.
//!
//! These types represent the search evidence, products and sheets that flow
//! through the enrichment pipeline and into the store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Shipping weight (kg) per garment family.
pub const WEIGHT_TABLE: [(&str, f64); 5] = [
    ("baskets", 1.0),
    ("ensemble", 0.75),
    ("sweat", 0.5),
    ("t-shirt", 0.25),
    ("maroquinerie", 0.3),
];

/// The static weight reference table carried by every product unless overridden.
pub fn default_weight_table() -> BTreeMap<String, f64> {
    WEIGHT_TABLE
        .iter()
        .map(|(label, weight)| (label.to_string(), *weight))
        .collect()
}

/// Flattened signal extracted from a search provider's raw results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchEvidence {
    pub titles: Vec<String>,
    pub descriptions: Vec<String>,
    pub brands: Vec<String>,
    pub prices: Vec<String>,
    pub source_urls: Vec<String>,
    /// One of the keyword-family labels, or empty.
    pub detected_category: String,
}

impl SearchEvidence {
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
            && self.descriptions.is_empty()
            && self.brands.is_empty()
            && self.prices.is_empty()
    }

    /// Brands in first-seen order, without repeats.
    pub fn distinct_brands(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for brand in &self.brands {
            if !seen.iter().any(|b| b == brand) {
                seen.push(brand.clone());
            }
        }
        seen
    }
}

/// Generated product content, before an id and timestamps are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub title: String,
    pub brand: String,
    pub model: String,
    pub color: String,
    pub category: String,
    pub price: Option<f64>,
    pub description: String,
    pub characteristics: BTreeMap<String, String>,
    pub sizes: Vec<String>,
    pub weight_by_type: BTreeMap<String, f64>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// A persisted product record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub ean_code: String,
    pub title: String,
    pub brand: String,
    pub model: String,
    pub color: String,
    pub category: String,
    pub price: Option<f64>,
    pub description: String,
    pub characteristics: BTreeMap<String, String>,
    pub sizes: Vec<String>,
    pub weight_by_type: BTreeMap<String, f64>,
    pub images: Vec<String>,
    /// Provenance note when the product was generated from a search.
    pub search_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn from_draft(ean_code: &str, draft: ProductDraft, search_source: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ean_code: ean_code.to_string(),
            title: draft.title,
            brand: draft.brand,
            model: draft.model,
            color: draft.color,
            category: draft.category,
            price: draft.price,
            description: draft.description,
            characteristics: draft.characteristics,
            sizes: draft.sizes,
            weight_by_type: draft.weight_by_type,
            images: draft.images,
            search_source,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update. `id`, `ean_code` and `created_at` never change.
    pub fn apply(&mut self, update: ProductUpdate) -> CatalogResult<()> {
        for (field, value) in [
            ("title", &update.title),
            ("brand", &update.brand),
            ("model", &update.model),
            ("color", &update.color),
            ("category", &update.category),
            ("description", &update.description),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(CatalogError::InvalidInput(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        if let Some(v) = update.title {
            self.title = v;
        }
        if let Some(v) = update.brand {
            self.brand = v;
        }
        if let Some(v) = update.model {
            self.model = v;
        }
        if let Some(v) = update.color {
            self.color = v;
        }
        if let Some(v) = update.category {
            self.category = v;
        }
        if let Some(v) = update.price {
            self.price = Some(v);
        }
        if let Some(v) = update.description {
            self.description = v;
        }
        if let Some(v) = update.characteristics {
            self.characteristics = v;
        }
        if let Some(v) = update.sizes {
            self.sizes = v;
        }
        if let Some(v) = update.weight_by_type {
            self.weight_by_type = v;
        }
        if let Some(v) = update.images {
            self.images = v;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Payload for creating a product from manually entered fields.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub ean_code: String,
    pub title: String,
    pub brand: String,
    pub model: String,
    pub color: String,
    pub category: String,
    #[serde(default)]
    pub price: Option<f64>,
    pub description: String,
    #[serde(default)]
    pub characteristics: BTreeMap<String, String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub weight_by_type: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewProduct {
    pub fn into_product(self) -> CatalogResult<Product> {
        for (field, value) in [
            ("ean_code", &self.ean_code),
            ("title", &self.title),
            ("brand", &self.brand),
            ("model", &self.model),
            ("color", &self.color),
            ("category", &self.category),
            ("description", &self.description),
        ] {
            if value.trim().is_empty() {
                return Err(CatalogError::InvalidInput(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        let ean_code = self.ean_code.trim().to_string();
        let draft = ProductDraft {
            title: self.title,
            brand: self.brand,
            model: self.model,
            color: self.color,
            category: self.category,
            price: self.price,
            description: self.description,
            characteristics: self.characteristics,
            sizes: self.sizes,
            weight_by_type: self.weight_by_type.unwrap_or_else(default_weight_table),
            images: self.images,
        };
        Ok(Product::from_draft(&ean_code, draft, None))
    }
}

/// Partial product update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub characteristics: Option<BTreeMap<String, String>>,
    pub sizes: Option<Vec<String>>,
    pub weight_by_type: Option<BTreeMap<String, f64>>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetStatus {
    #[default]
    Draft,
    Published,
    Exported,
}

impl SheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetStatus::Draft => "draft",
            SheetStatus::Published => "published",
            SheetStatus::Exported => "exported",
        }
    }
}

impl fmt::Display for SheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SheetStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(SheetStatus::Draft),
            "published" => Ok(SheetStatus::Published),
            "exported" => Ok(SheetStatus::Exported),
            other => Err(CatalogError::InvalidInput(format!(
                "unknown sheet status '{}': must be draft, published or exported",
                other
            ))),
        }
    }
}

/// Generated sheet content, before id, status and timestamps are assigned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetDraft {
    pub title: String,
    pub reference: String,
    pub color_code: String,
    pub price_ttc: f64,
    pub description: String,
    pub characteristics: BTreeMap<String, String>,
    pub seo_title: String,
    pub seo_description: String,
    pub variants: Vec<serde_json::Value>,
    pub export_data: serde_json::Map<String, serde_json::Value>,
}

/// A persisted sales/SEO sheet derived from a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSheet {
    pub id: String,
    pub product_id: String,
    pub title: String,
    pub reference: String,
    pub color_code: String,
    pub price_ttc: f64,
    pub description: String,
    pub characteristics: BTreeMap<String, String>,
    pub variants: Vec<serde_json::Value>,
    /// Snapshot of the product's weight table at creation time.
    pub weight_info: BTreeMap<String, f64>,
    pub seo_title: String,
    pub seo_description: String,
    pub associated_products: Vec<String>,
    pub export_data: serde_json::Map<String, serde_json::Value>,
    pub status: SheetStatus,
    pub created_at: DateTime<Utc>,
}

impl ProductSheet {
    pub fn from_draft(product: &Product, draft: SheetDraft) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            title: draft.title,
            reference: draft.reference,
            color_code: draft.color_code,
            price_ttc: draft.price_ttc,
            description: draft.description,
            characteristics: draft.characteristics,
            variants: draft.variants,
            weight_info: product.weight_by_type.clone(),
            seo_title: draft.seo_title,
            seo_description: draft.seo_description,
            associated_products: Vec::new(),
            export_data: draft.export_data,
            status: SheetStatus::Draft,
            created_at: Utc::now(),
        }
    }
}

/// Append-only audit record of one search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub id: String,
    pub ean_code: String,
    pub search_query: String,
    pub results: Vec<serde_json::Value>,
    pub evidence: SearchEvidence,
    pub created_at: DateTime<Utc>,
}

impl SearchRecord {
    pub fn new(
        ean_code: &str,
        search_query: String,
        results: Vec<serde_json::Value>,
        evidence: SearchEvidence,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ean_code: ean_code.to_string(),
            search_query,
            results,
            evidence,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product() -> NewProduct {
        NewProduct {
            ean_code: " 3401570052 ".into(),
            title: "Sweat Lacoste".into(),
            brand: "Lacoste".into(),
            model: "Classic".into(),
            color: "Bleu".into(),
            category: "Vêtements".into(),
            price: None,
            description: "Un sweat.".into(),
            characteristics: BTreeMap::new(),
            sizes: vec!["M".into()],
            weight_by_type: None,
            images: vec![],
        }
    }

    #[test]
    fn test_weight_table_matches_reference() {
        let table = default_weight_table();
        assert_eq!(table.len(), 5);
        assert_eq!(table["baskets"], 1.0);
        assert_eq!(table["maroquinerie"], 0.3);
    }

    #[test]
    fn test_new_product_defaults_weight_table_and_trims_ean() {
        let product = new_product().into_product().unwrap();
        assert_eq!(product.ean_code, "3401570052");
        assert_eq!(product.weight_by_type, default_weight_table());
        assert_eq!(product.price, None);
        assert_eq!(product.created_at, product.updated_at);
    }

    #[test]
    fn test_new_product_rejects_empty_brand() {
        let mut input = new_product();
        input.brand = "".into();
        let err = input.into_product().unwrap_err();
        assert_eq!(err.code(), "invalid_input");
        assert!(err.to_string().contains("brand"));
    }

    #[test]
    fn test_apply_update_keeps_identity() {
        let mut product = new_product().into_product().unwrap();
        let id = product.id.clone();
        let update = ProductUpdate {
            title: Some("Sweat Lacoste Bleu".into()),
            price: Some(89.0),
            ..Default::default()
        };
        product.apply(update).unwrap();
        assert_eq!(product.id, id);
        assert_eq!(product.ean_code, "3401570052");
        assert_eq!(product.title, "Sweat Lacoste Bleu");
        assert_eq!(product.price, Some(89.0));
        assert!(product.updated_at >= product.created_at);
    }

    #[test]
    fn test_apply_update_rejects_blank_field() {
        let mut product = new_product().into_product().unwrap();
        let update = ProductUpdate {
            color: Some("   ".into()),
            ..Default::default()
        };
        assert!(product.apply(update).is_err());
        assert_eq!(product.color, "Bleu");
    }

    #[test]
    fn test_sheet_status_parse() {
        assert_eq!("published".parse::<SheetStatus>().unwrap(), SheetStatus::Published);
        assert_eq!(SheetStatus::default(), SheetStatus::Draft);
        assert!("archived".parse::<SheetStatus>().is_err());
    }

    #[test]
    fn test_distinct_brands_preserve_order() {
        let evidence = SearchEvidence {
            brands: vec!["Nike".into(), "Adidas".into(), "Nike".into()],
            ..Default::default()
        };
        assert_eq!(evidence.distinct_brands(), vec!["Nike", "Adidas"]);
    }
}
