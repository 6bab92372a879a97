//! Catalog operations over stored products and sheets.
//!
//! Thin classified wrappers around [`Store`] used by both the `psg` CLI and
//! the HTTP server. Store failures become [`CatalogError::Persistence`];
//! missing ids become [`CatalogError::NotFound`].

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CatalogError, CatalogResult};
use crate::export::{export_sheet, ExportFormat};
use crate::models::{NewProduct, Product, ProductSheet, ProductUpdate, SheetStatus};
use crate::store::{ProductQuery, SheetQuery, Store};

/// Which external providers are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApiStatus {
    pub generation_configured: bool,
    pub search_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub total_products: i64,
    pub total_sheets: i64,
    pub total_searches: i64,
    pub categories: BTreeMap<String, i64>,
    pub api_status: ApiStatus,
}

pub async fn create_product(store: &dyn Store, new: NewProduct) -> CatalogResult<Product> {
    let product = new.into_product()?;
    store
        .insert_product(&product)
        .await
        .map_err(CatalogError::Persistence)?;
    tracing::info!(product_id = %product.id, ean = %product.ean_code, "product created");
    Ok(product)
}

pub async fn get_product(store: &dyn Store, id: &str) -> CatalogResult<Product> {
    store
        .get_product(id)
        .await
        .map_err(CatalogError::Persistence)?
        .ok_or_else(|| CatalogError::not_found("product", id))
}

pub async fn list_products(store: &dyn Store, query: &ProductQuery) -> CatalogResult<Vec<Product>> {
    validate_page(query.limit, query.offset)?;
    store
        .list_products(query)
        .await
        .map_err(CatalogError::Persistence)
}

/// Apply a partial update. `id`, `ean_code` and `created_at` never change.
pub async fn update_product(
    store: &dyn Store,
    id: &str,
    update: ProductUpdate,
) -> CatalogResult<Product> {
    let mut product = get_product(store, id).await?;
    product.apply(update)?;
    let found = store
        .update_product(&product)
        .await
        .map_err(CatalogError::Persistence)?;
    if !found {
        return Err(CatalogError::not_found("product", id));
    }
    Ok(product)
}

/// Delete a product and its sheets. Returns the number of sheets removed.
pub async fn delete_product(store: &dyn Store, id: &str) -> CatalogResult<u64> {
    let removed = store
        .delete_product(id)
        .await
        .map_err(CatalogError::Persistence)?
        .ok_or_else(|| CatalogError::not_found("product", id))?;
    tracing::info!(product_id = %id, sheets_removed = removed, "product deleted");
    Ok(removed)
}

pub async fn get_sheet(store: &dyn Store, id: &str) -> CatalogResult<ProductSheet> {
    store
        .get_sheet(id)
        .await
        .map_err(CatalogError::Persistence)?
        .ok_or_else(|| CatalogError::not_found("sheet", id))
}

pub async fn list_sheets(store: &dyn Store, query: &SheetQuery) -> CatalogResult<Vec<ProductSheet>> {
    validate_page(query.limit, query.offset)?;
    store
        .list_sheets(query)
        .await
        .map_err(CatalogError::Persistence)
}

/// All sheets of one product, newest first. Empty for unknown or deleted products.
pub async fn product_sheets(store: &dyn Store, product_id: &str) -> CatalogResult<Vec<ProductSheet>> {
    let query = SheetQuery {
        product_id: Some(product_id.to_string()),
        limit: i64::MAX,
        ..Default::default()
    };
    store
        .list_sheets(&query)
        .await
        .map_err(CatalogError::Persistence)
}

/// Record an operator status change. Any transition is allowed.
pub async fn set_sheet_status(
    store: &dyn Store,
    id: &str,
    status: SheetStatus,
) -> CatalogResult<ProductSheet> {
    let sheet = store
        .set_sheet_status(id, status)
        .await
        .map_err(CatalogError::Persistence)?
        .ok_or_else(|| CatalogError::not_found("sheet", id))?;
    tracing::info!(sheet_id = %id, status = %status, "sheet status changed");
    Ok(sheet)
}

pub async fn export(store: &dyn Store, id: &str, format: ExportFormat) -> CatalogResult<Value> {
    let sheet = get_sheet(store, id).await?;
    Ok(export_sheet(&sheet, format))
}

pub async fn stats(store: &dyn Store, api_status: ApiStatus) -> CatalogResult<CatalogStats> {
    let counts = store.counts().await.map_err(CatalogError::Persistence)?;
    Ok(CatalogStats {
        total_products: counts.products,
        total_sheets: counts.sheets,
        total_searches: counts.searches,
        categories: counts.products_by_category,
        api_status,
    })
}

fn validate_page(limit: i64, offset: i64) -> CatalogResult<()> {
    if limit < 1 {
        return Err(CatalogError::InvalidInput("limit must be at least 1".into()));
    }
    if offset < 0 {
        return Err(CatalogError::InvalidInput("offset must not be negative".into()));
    }
    Ok(())
}
