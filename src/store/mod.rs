//! Storage abstraction for the product catalog.
//!
//! The [`Store`] trait covers every durable operation the pipeline and the
//! catalog need, so the same code runs against SQLite in production and an
//! in-memory backend in tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Inserts are independent single-record writes; the only multi-record
//! operation is [`Store::delete_product`], which removes a product and its
//! sheets together.

pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Product, ProductSheet, SearchRecord, SheetStatus};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Filters for [`Store::list_products`].
#[derive(Debug, Clone)]
pub struct ProductQuery {
    pub limit: i64,
    pub offset: i64,
    pub category: Option<String>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
            category: None,
        }
    }
}

/// Filters for [`Store::list_sheets`].
#[derive(Debug, Clone)]
pub struct SheetQuery {
    pub limit: i64,
    pub offset: i64,
    pub status: Option<SheetStatus>,
    pub product_id: Option<String>,
}

impl Default for SheetQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
            status: None,
            product_id: None,
        }
    }
}

/// Aggregate counts for the statistics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreCounts {
    pub products: i64,
    pub sheets: i64,
    pub searches: i64,
    pub products_by_category: BTreeMap<String, i64>,
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_search`](Store::insert_search) | Append a search audit record |
/// | [`insert_product`](Store::insert_product) | Persist a new product |
/// | [`update_product`](Store::update_product) | Overwrite an existing product |
/// | [`get_product`](Store::get_product) | Fetch one product |
/// | [`list_products`](Store::list_products) | Page through products, newest first |
/// | [`delete_product`](Store::delete_product) | Delete a product and its sheets |
/// | [`insert_sheet`](Store::insert_sheet) | Persist a new sheet |
/// | [`get_sheet`](Store::get_sheet) | Fetch one sheet |
/// | [`list_sheets`](Store::list_sheets) | Page through sheets, newest first |
/// | [`set_sheet_status`](Store::set_sheet_status) | Record an operator status change |
/// | [`counts`](Store::counts) | Totals for statistics |
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_search(&self, record: &SearchRecord) -> Result<()>;

    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Returns `false` when no product has this id.
    async fn update_product(&self, product: &Product) -> Result<bool>;

    async fn get_product(&self, id: &str) -> Result<Option<Product>>;

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>>;

    /// Delete a product and every sheet derived from it.
    ///
    /// Returns `None` when the product does not exist, otherwise the number
    /// of sheets removed.
    async fn delete_product(&self, id: &str) -> Result<Option<u64>>;

    async fn insert_sheet(&self, sheet: &ProductSheet) -> Result<()>;

    async fn get_sheet(&self, id: &str) -> Result<Option<ProductSheet>>;

    async fn list_sheets(&self, query: &SheetQuery) -> Result<Vec<ProductSheet>>;

    /// Returns the updated sheet, or `None` when it does not exist.
    async fn set_sheet_status(&self, id: &str, status: SheetStatus)
        -> Result<Option<ProductSheet>>;

    async fn counts(&self) -> Result<StoreCounts>;
}
