//! Strict parsing of JSON replies from a completion provider.
//!
//! A reply must be a single JSON object, optionally wrapped in a Markdown
//! code fence, carrying exactly the required keys with the expected types.
//! Anything else is a [`CatalogError::GenerationFormat`]; partial data is
//! never accepted.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CatalogError, CatalogResult};

/// Remove a surrounding ```` ```json ```` or ```` ``` ```` fence, if any.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Parse `content` into `T` after checking the object has exactly `required` keys.
pub fn parse_reply<T: DeserializeOwned>(content: &str, required: &[&str]) -> CatalogResult<T> {
    let body = strip_code_fence(content);

    let value: Value = serde_json::from_str(body).map_err(|e| {
        CatalogError::GenerationFormat(format!("reply is not valid JSON: {}", e))
    })?;

    let object = value.as_object().ok_or_else(|| {
        CatalogError::GenerationFormat("reply is not a JSON object".to_string())
    })?;

    let missing: Vec<&str> = required
        .iter()
        .filter(|key| !object.contains_key(**key))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::GenerationFormat(format!(
            "reply is missing keys: {}",
            missing.join(", ")
        )));
    }

    let unexpected: Vec<&str> = object
        .keys()
        .map(String::as_str)
        .filter(|key| !required.contains(key))
        .collect();
    if !unexpected.is_empty() {
        return Err(CatalogError::GenerationFormat(format!(
            "reply has unexpected keys: {}",
            unexpected.join(", ")
        )));
    }

    serde_json::from_value(value)
        .map_err(|e| CatalogError::GenerationFormat(format!("reply has a mistyped field: {}", e)))
}

/// Reject blank values for fields that must carry text.
pub fn require_text(fields: &[(&str, &str)]) -> CatalogResult<()> {
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(CatalogError::GenerationFormat(format!(
                "reply field '{}' is empty",
                name
            )));
        }
    }
    Ok(())
}
