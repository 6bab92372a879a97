//! SQLite-backed [`Store`] implementation.
//!
//! Nested mappings and sequences are stored as JSON text columns and
//! timestamps as epoch milliseconds. The schema is created by
//! [`crate::migrate::run_migrations`].

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{Product, ProductSheet, SearchRecord, SheetStatus};

use super::{ProductQuery, SheetQuery, Store, StoreCounts};

const PRODUCT_COLUMNS: &str = "id, ean_code, title, brand, model, color, category, price, \
     description, characteristics_json, sizes_json, weight_json, images_json, search_source, \
     created_at, updated_at";

const SHEET_COLUMNS: &str = "id, product_id, title, reference, color_code, price_ttc, \
     description, characteristics_json, variants_json, weight_info_json, seo_title, \
     seo_description, associated_json, export_json, status, created_at";

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).with_context(|| format!("timestamp out of range: {}", ms))
}

fn decode_json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let text: String = row.try_get(column)?;
    serde_json::from_str(&text).with_context(|| format!("corrupt JSON in column {}", column))
}

fn row_to_product(row: &SqliteRow) -> Result<Product> {
    Ok(Product {
        id: row.try_get("id")?,
        ean_code: row.try_get("ean_code")?,
        title: row.try_get("title")?,
        brand: row.try_get("brand")?,
        model: row.try_get("model")?,
        color: row.try_get("color")?,
        category: row.try_get("category")?,
        price: row.try_get("price")?,
        description: row.try_get("description")?,
        characteristics: decode_json(row, "characteristics_json")?,
        sizes: decode_json(row, "sizes_json")?,
        weight_by_type: decode_json(row, "weight_json")?,
        images: decode_json(row, "images_json")?,
        search_source: row.try_get("search_source")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
    })
}

fn row_to_sheet(row: &SqliteRow) -> Result<ProductSheet> {
    let status: String = row.try_get("status")?;
    Ok(ProductSheet {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        title: row.try_get("title")?,
        reference: row.try_get("reference")?,
        color_code: row.try_get("color_code")?,
        price_ttc: row.try_get("price_ttc")?,
        description: row.try_get("description")?,
        characteristics: decode_json(row, "characteristics_json")?,
        variants: decode_json(row, "variants_json")?,
        weight_info: decode_json(row, "weight_info_json")?,
        seo_title: row.try_get("seo_title")?,
        seo_description: row.try_get("seo_description")?,
        associated_products: decode_json(row, "associated_json")?,
        export_data: decode_json(row, "export_json")?,
        status: status.parse()?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_search(&self, record: &SearchRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_searches (id, ean_code, search_query, results_json,
                                          evidence_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.ean_code)
        .bind(&record.search_query)
        .bind(serde_json::to_string(&record.results)?)
        .bind(serde_json::to_string(&record.evidence)?)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO products ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PRODUCT_COLUMNS
        ))
        .bind(&product.id)
        .bind(&product.ean_code)
        .bind(&product.title)
        .bind(&product.brand)
        .bind(&product.model)
        .bind(&product.color)
        .bind(&product.category)
        .bind(product.price)
        .bind(&product.description)
        .bind(serde_json::to_string(&product.characteristics)?)
        .bind(serde_json::to_string(&product.sizes)?)
        .bind(serde_json::to_string(&product.weight_by_type)?)
        .bind(serde_json::to_string(&product.images)?)
        .bind(&product.search_source)
        .bind(product.created_at.timestamp_millis())
        .bind(product.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                title = ?, brand = ?, model = ?, color = ?, category = ?, price = ?,
                description = ?, characteristics_json = ?, sizes_json = ?, weight_json = ?,
                images_json = ?, search_source = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&product.title)
        .bind(&product.brand)
        .bind(&product.model)
        .bind(&product.color)
        .bind(&product.category)
        .bind(product.price)
        .bind(&product.description)
        .bind(serde_json::to_string(&product.characteristics)?)
        .bind(serde_json::to_string(&product.sizes)?)
        .bind(serde_json::to_string(&product.weight_by_type)?)
        .bind(serde_json::to_string(&product.images)?)
        .bind(&product.search_source)
        .bind(product.updated_at.timestamp_millis())
        .bind(&product.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM products WHERE id = ?",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM products
             WHERE (? IS NULL OR category = ?)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?",
            PRODUCT_COLUMNS
        ))
        .bind(&query.category)
        .bind(&query.category)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn delete_product(&self, id: &str) -> Result<Option<u64>> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM products WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Ok(None);
        }

        let sheets = sqlx::query("DELETE FROM product_sheets WHERE product_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(sheets))
    }

    async fn insert_sheet(&self, sheet: &ProductSheet) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO product_sheets ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            SHEET_COLUMNS
        ))
        .bind(&sheet.id)
        .bind(&sheet.product_id)
        .bind(&sheet.title)
        .bind(&sheet.reference)
        .bind(&sheet.color_code)
        .bind(sheet.price_ttc)
        .bind(&sheet.description)
        .bind(serde_json::to_string(&sheet.characteristics)?)
        .bind(serde_json::to_string(&sheet.variants)?)
        .bind(serde_json::to_string(&sheet.weight_info)?)
        .bind(&sheet.seo_title)
        .bind(&sheet.seo_description)
        .bind(serde_json::to_string(&sheet.associated_products)?)
        .bind(serde_json::to_string(&sheet.export_data)?)
        .bind(sheet.status.as_str())
        .bind(sheet.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_sheet(&self, id: &str) -> Result<Option<ProductSheet>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM product_sheets WHERE id = ?",
            SHEET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_sheet).transpose()
    }

    async fn list_sheets(&self, query: &SheetQuery) -> Result<Vec<ProductSheet>> {
        let status = query.status.map(|s| s.as_str());
        let rows = sqlx::query(&format!(
            "SELECT {} FROM product_sheets
             WHERE (? IS NULL OR status = ?)
               AND (? IS NULL OR product_id = ?)
             ORDER BY created_at DESC, rowid DESC
             LIMIT ? OFFSET ?",
            SHEET_COLUMNS
        ))
        .bind(status)
        .bind(status)
        .bind(&query.product_id)
        .bind(&query.product_id)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_sheet).collect()
    }

    async fn set_sheet_status(
        &self,
        id: &str,
        status: SheetStatus,
    ) -> Result<Option<ProductSheet>> {
        let result = sqlx::query("UPDATE product_sheets SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_sheet(id).await
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        let sheets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_sheets")
            .fetch_one(&self.pool)
            .await?;
        let searches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_searches")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            "SELECT category, COUNT(*) AS n FROM products GROUP BY category ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut products_by_category: BTreeMap<String, i64> = BTreeMap::new();
        for row in &rows {
            products_by_category.insert(row.try_get("category")?, row.try_get("n")?);
        }

        Ok(StoreCounts {
            products,
            sheets,
            searches,
            products_by_category,
        })
    }
}
