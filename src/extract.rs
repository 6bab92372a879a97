//! Evidence extraction from raw search results.
//!
//! Flattens a provider's result items into a [`SearchEvidence`] bundle and
//! classifies the product family with an ordered keyword table. Extraction
//! never fails: items that are missing fields or are not objects are skipped.

use serde_json::Value;

use crate::models::SearchEvidence;
use crate::search::RawSearchResponse;

/// Only the first results are considered, to bound prompt size downstream.
pub const MAX_EVIDENCE_ITEMS: usize = 10;

/// Keyword families in priority order. The first family with any term
/// present in the text wins.
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Chaussures",
        &["basket", "chaussure", "sneaker", "air max", "nike", "adidas"],
    ),
    (
        "Vêtements",
        &["t-shirt", "polo", "sweat", "hoodie", "vêtement"],
    ),
    ("Maroquinerie", &["sac", "portefeuille", "maroquinerie"]),
];

/// Return the label of the first keyword family present in `text`, or `""`.
///
/// `text` is lowercased before matching.
pub fn classify_category(text: &str) -> &'static str {
    let text = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, terms)| terms.iter().any(|term| text.contains(term)))
        .map(|(label, _)| *label)
        .unwrap_or("")
}

pub fn extract_evidence(response: &RawSearchResponse) -> SearchEvidence {
    extract_items(&response.items)
}

pub fn extract_items(items: &[Value]) -> SearchEvidence {
    let mut evidence = SearchEvidence::default();

    for item in items.iter().take(MAX_EVIDENCE_ITEMS) {
        if let Some(title) = item.get("title").and_then(Value::as_str) {
            evidence.titles.push(title.to_string());
        }
        if let Some(link) = item.get("link").and_then(Value::as_str) {
            evidence.source_urls.push(link.to_string());
        }
        if let Some(snippet) = item.get("snippet").and_then(Value::as_str) {
            evidence.descriptions.push(snippet.to_string());
        }

        let products = item
            .get("pagemap")
            .and_then(|p| p.get("product"))
            .and_then(Value::as_array);
        for product in products.into_iter().flatten() {
            if let Some(brand) = product.get("brand").and_then(Value::as_str) {
                evidence.brands.push(brand.to_string());
            }
            if let Some(price) = product.get("price").and_then(scalar_text) {
                evidence.prices.push(price);
            }
        }
    }

    let blob = evidence
        .titles
        .iter()
        .chain(evidence.descriptions.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    evidence.detected_category = classify_category(&blob).to_string();

    evidence
}

/// Prices come back either as strings or as bare numbers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
