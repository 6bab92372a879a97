//! In-memory [`Store`] implementation for tests and database-free runs.
//!
//! Records live in insertion-ordered `Vec`s behind `std::sync::RwLock`.
//! Listing sorts newest first; ties keep the most recently inserted first.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Product, ProductSheet, SearchRecord, SheetStatus};

use super::{ProductQuery, SheetQuery, Store, StoreCounts};

/// In-memory store for testing.
pub struct InMemoryStore {
    products: RwLock<Vec<Product>>,
    sheets: RwLock<Vec<ProductSheet>>,
    searches: RwLock<Vec<SearchRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(Vec::new()),
            sheets: RwLock::new(Vec::new()),
            searches: RwLock::new(Vec::new()),
        }
    }

    /// Search records written so far, oldest first.
    pub fn searches(&self) -> Result<Vec<SearchRecord>> {
        Ok(read(&self.searches)?.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

/// Newest first, then apply offset/limit.
fn page<T: Clone>(
    items: &[T],
    created: impl Fn(&T) -> i64,
    keep: impl Fn(&T) -> bool,
    limit: i64,
    offset: i64,
) -> Vec<T> {
    let mut selected: Vec<T> = items.iter().rev().filter(|i| keep(*i)).cloned().collect();
    selected.sort_by_key(|i| std::cmp::Reverse(created(i)));
    selected
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_search(&self, record: &SearchRecord) -> Result<()> {
        write(&self.searches)?.push(record.clone());
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut products = write(&self.products)?;
        if products.iter().any(|p| p.id == product.id) {
            return Err(anyhow!("product {} already exists", product.id));
        }
        products.push(product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<bool> {
        let mut products = write(&self.products)?;
        match products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => {
                *existing = product.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>> {
        Ok(read(&self.products)?.iter().find(|p| p.id == id).cloned())
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        let products = read(&self.products)?;
        Ok(page(
            &products,
            |p| p.created_at.timestamp_millis(),
            |p| query.category.as_ref().is_none_or(|c| &p.category == c),
            query.limit,
            query.offset,
        ))
    }

    async fn delete_product(&self, id: &str) -> Result<Option<u64>> {
        let mut products = write(&self.products)?;
        let mut sheets = write(&self.sheets)?;
        let Some(pos) = products.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let before = sheets.len();
        sheets.retain(|s| s.product_id != id);
        products.remove(pos);
        Ok(Some((before - sheets.len()) as u64))
    }

    async fn insert_sheet(&self, sheet: &ProductSheet) -> Result<()> {
        let products = read(&self.products)?;
        if !products.iter().any(|p| p.id == sheet.product_id) {
            return Err(anyhow!(
                "sheet {} references missing product {}",
                sheet.id,
                sheet.product_id
            ));
        }
        write(&self.sheets)?.push(sheet.clone());
        Ok(())
    }

    async fn get_sheet(&self, id: &str) -> Result<Option<ProductSheet>> {
        Ok(read(&self.sheets)?.iter().find(|s| s.id == id).cloned())
    }

    async fn list_sheets(&self, query: &SheetQuery) -> Result<Vec<ProductSheet>> {
        let sheets = read(&self.sheets)?;
        Ok(page(
            &sheets,
            |s| s.created_at.timestamp_millis(),
            |s| {
                query.status.is_none_or(|st| s.status == st)
                    && query
                        .product_id
                        .as_ref()
                        .is_none_or(|pid| &s.product_id == pid)
            },
            query.limit,
            query.offset,
        ))
    }

    async fn set_sheet_status(
        &self,
        id: &str,
        status: SheetStatus,
    ) -> Result<Option<ProductSheet>> {
        let mut sheets = write(&self.sheets)?;
        Ok(sheets.iter_mut().find(|s| s.id == id).map(|s| {
            s.status = status;
            s.clone()
        }))
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let products = read(&self.products)?;
        let mut products_by_category = BTreeMap::new();
        for p in products.iter() {
            *products_by_category.entry(p.category.clone()).or_insert(0) += 1;
        }
        Ok(StoreCounts {
            products: products.len() as i64,
            sheets: read(&self.sheets)?.len() as i64,
            searches: read(&self.searches)?.len() as i64,
            products_by_category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewProduct, SheetDraft};

    fn product(ean: &str, category: &str) -> Product {
        NewProduct {
            ean_code: ean.into(),
            title: format!("Produit {}", ean),
            brand: "Nike".into(),
            model: "X".into(),
            color: "Noir".into(),
            category: category.into(),
            price: Some(10.0),
            description: "d".into(),
            characteristics: BTreeMap::new(),
            sizes: vec![],
            weight_by_type: None,
            images: vec![],
        }
        .into_product()
        .unwrap()
    }

    fn sheet(p: &Product) -> ProductSheet {
        ProductSheet::from_draft(
            p,
            SheetDraft {
                title: p.title.clone(),
                reference: "REF".into(),
                color_code: "NOI".into(),
                price_ttc: 10.0,
                description: "d".into(),
                characteristics: BTreeMap::new(),
                seo_title: "s".into(),
                seo_description: "s".into(),
                variants: vec![],
                export_data: serde_json::Map::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_delete_cascades_only_own_sheets() {
        let store = InMemoryStore::new();
        let a = product("1", "Chaussures");
        let b = product("2", "Chaussures");
        store.insert_product(&a).await.unwrap();
        store.insert_product(&b).await.unwrap();
        store.insert_sheet(&sheet(&a)).await.unwrap();
        store.insert_sheet(&sheet(&a)).await.unwrap();
        store.insert_sheet(&sheet(&b)).await.unwrap();

        assert_eq!(store.delete_product(&a.id).await.unwrap(), Some(2));
        let remaining = store.list_sheets(&SheetQuery::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].product_id, b.id);

        assert_eq!(store.delete_product(&b.id).await.unwrap(), Some(1));
        assert_eq!(store.delete_product(&b.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_without_sheets_is_zero() {
        let store = InMemoryStore::new();
        let p = product("1", "Chaussures");
        store.insert_product(&p).await.unwrap();
        assert_eq!(store.delete_product(&p.id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_sheet_for_missing_product_rejected() {
        let store = InMemoryStore::new();
        let orphan = sheet(&product("1", "Chaussures"));
        assert!(store.insert_sheet(&orphan).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_and_order() {
        let store = InMemoryStore::new();
        let first = product("1", "Chaussures");
        let second = product("2", "Vêtements");
        let third = product("3", "Chaussures");
        for p in [&first, &second, &third] {
            store.insert_product(p).await.unwrap();
        }

        let all = store.list_products(&ProductQuery::default()).await.unwrap();
        assert_eq!(all.first().map(|p| p.id.as_str()), Some(third.id.as_str()));

        let shoes = store
            .list_products(&ProductQuery {
                category: Some("Chaussures".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(shoes.len(), 2);

        let paged = store
            .list_products(&ProductQuery {
                limit: 1,
                offset: 2,
                category: None,
            })
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.products, 3);
        assert_eq!(counts.products_by_category["Chaussures"], 2);
    }

    #[tokio::test]
    async fn test_set_status() {
        let store = InMemoryStore::new();
        let p = product("1", "Chaussures");
        store.insert_product(&p).await.unwrap();
        let s = sheet(&p);
        store.insert_sheet(&s).await.unwrap();

        let updated = store
            .set_sheet_status(&s.id, SheetStatus::Published)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, SheetStatus::Published);
        assert!(store
            .set_sheet_status("missing", SheetStatus::Exported)
            .await
            .unwrap()
            .is_none());
    }
}
