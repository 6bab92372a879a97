//! End-to-end pipeline scenarios against the in-memory store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::json;

use product_sheets::completion::{CompletionProvider, CompletionRequest, GenerationMode};
use product_sheets::config::CatalogConfig;
use product_sheets::export::prestashop_record;
use product_sheets::models::default_weight_table;
use product_sheets::pipeline::{GenerateRequest, Pipeline};
use product_sheets::search::{RawSearchResponse, SearchProvider, SimulatedSearch};
use product_sheets::store::{InMemoryStore, ProductQuery, SheetQuery, Store};

struct EmptySearch;

#[async_trait]
impl SearchProvider for EmptySearch {
    fn name(&self) -> &str {
        "empty"
    }

    async fn search(&self, ean_code: &str) -> Result<RawSearchResponse> {
        Ok(RawSearchResponse {
            query: ean_code.to_string(),
            items: vec![],
            total_results: 0,
        })
    }
}

struct DownSearch;

#[async_trait]
impl SearchProvider for DownSearch {
    fn name(&self) -> &str {
        "down"
    }

    async fn search(&self, _ean_code: &str) -> Result<RawSearchResponse> {
        bail!("connection refused")
    }
}

/// Reports more hits than it hands back, like a truncating provider.
struct TruncatedSearch;

#[async_trait]
impl SearchProvider for TruncatedSearch {
    fn name(&self) -> &str {
        "truncated"
    }

    async fn search(&self, ean_code: &str) -> Result<RawSearchResponse> {
        Ok(RawSearchResponse {
            query: format!("{} produit", ean_code),
            items: vec![
                json!({"title": "Polo Lacoste", "pagemap": {"product": [{"brand": "Lacoste"}]}}),
                json!({"title": "Polo Lacoste L.12.12"}),
            ],
            total_results: 7,
        })
    }
}

/// Replays canned replies in order and counts calls.
struct Scripted {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<usize>,
}

impl Scripted {
    fn new(replies: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CompletionProvider for Scripted {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => bail!("no scripted reply left"),
        }
    }
}

fn product_reply() -> String {
    json!({
        "title": "Sac Lacoste Chantaco",
        "brand": "Lacoste",
        "model": "Chantaco",
        "color": "Noir",
        "category": "Maroquinerie",
        "price": 150.0,
        "description": "Un sac en cuir.",
        "characteristics": {"marque": "Lacoste", "couleur": "Noir", "matière": "Cuir", "saison": "Toute saison"},
        "sizes": ["Unique"],
        "weight_by_type": {"maroquinerie": 0.3}
    })
    .to_string()
}

fn pipeline(
    store: Arc<InMemoryStore>,
    search: Arc<dyn SearchProvider>,
    mode: GenerationMode,
) -> Pipeline {
    Pipeline::new(store, search, mode, CatalogConfig::default())
}

#[tokio::test]
async fn test_fallback_with_empty_evidence() {
    let store = Arc::new(InMemoryStore::new());
    let p = pipeline(store.clone(), Arc::new(EmptySearch), GenerationMode::Fallback);

    let resp = p
        .generate(GenerateRequest {
            ean_code: "3401570052".into(),
            generate_sheet: true,
        })
        .await
        .unwrap();

    assert!(resp.success);
    assert_eq!(resp.product.category, "Chaussures");
    assert_eq!(resp.product.brand, "Nike");
    assert_eq!(resp.product.price, Some(99.99));
    assert_eq!(resp.product.weight_by_type, default_weight_table());
    assert_eq!(resp.product.ean_code, "3401570052");
    assert_eq!(
        resp.product.search_source.as_deref(),
        Some("Google Search - 0 résultats")
    );
    assert_eq!(resp.search_summary.results_count, 0);
    assert_eq!(resp.search_summary.total_results, 0);
    assert!(resp.search_summary.brands_found.is_empty());

    let sheet = resp.product_sheet.unwrap();
    assert_eq!(sheet.product_id, resp.product.id);
    assert_eq!(sheet.weight_info, resp.product.weight_by_type);
    assert_eq!(prestashop_record(&sheet).unwrap().ean13, "3401570052");

    assert_eq!(store.list_products(&ProductQuery::default()).await.unwrap().len(), 1);
    assert_eq!(store.list_sheets(&SheetQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_simulated_search_feeds_generation() {
    let store = Arc::new(InMemoryStore::new());
    let p = pipeline(store.clone(), Arc::new(SimulatedSearch), GenerationMode::Fallback);

    let resp = p
        .generate(GenerateRequest {
            ean_code: "0194956623431".into(),
            generate_sheet: false,
        })
        .await
        .unwrap();

    assert!(resp.product_sheet.is_none());
    assert_eq!(resp.search_summary.results_count, 3);
    assert_eq!(resp.search_summary.brands_found, vec!["Nike"]);
    assert_eq!(resp.search_summary.category_detected, "Chaussures");
    assert_eq!(resp.product.price, Some(179.99));
    assert!(store.list_sheets(&SheetQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_summary_reports_total_before_truncation() {
    let store = Arc::new(InMemoryStore::new());
    let p = pipeline(store.clone(), Arc::new(TruncatedSearch), GenerationMode::Fallback);

    let resp = p
        .generate(GenerateRequest {
            ean_code: "3612345678901".into(),
            generate_sheet: false,
        })
        .await
        .unwrap();

    assert_eq!(resp.search_summary.results_count, 2);
    assert_eq!(resp.search_summary.total_results, 7);
    assert_eq!(resp.search_summary.category_detected, "Vêtements");
    assert_eq!(
        resp.product.search_source.as_deref(),
        Some("Google Search - 2 résultats")
    );
    assert_eq!(store.searches().unwrap()[0].search_query, "3612345678901 produit");
}

#[tokio::test]
async fn test_malformed_reply_persists_no_product() {
    let store = Arc::new(InMemoryStore::new());
    let provider = Scripted::new(vec![Ok("not json".into())]);
    let p = pipeline(
        store.clone(),
        Arc::new(SimulatedSearch),
        GenerationMode::Delegated(provider.clone()),
    );

    let err = p
        .generate(GenerateRequest {
            ean_code: "3401570052".into(),
            generate_sheet: true,
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "generation_format");
    assert_eq!(provider.calls(), 1);
    assert!(store.list_products(&ProductQuery::default()).await.unwrap().is_empty());
    // The search audit record is write-ahead and survives the failure.
    let searches = store.searches().unwrap();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].ean_code, "3401570052");
    assert_eq!(searches[0].results.len(), 3);
}

#[tokio::test]
async fn test_provider_failure_is_classified() {
    let store = Arc::new(InMemoryStore::new());
    let provider = Scripted::new(vec![Err("429 quota exceeded".into())]);
    let p = pipeline(
        store.clone(),
        Arc::new(EmptySearch),
        GenerationMode::Delegated(provider),
    );

    let err = p
        .generate(GenerateRequest {
            ean_code: "3401570052".into(),
            generate_sheet: false,
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "generation_provider");
    assert!(err.to_string().contains("quota exceeded"));
    assert!(store.list_products(&ProductQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_failure_aborts_before_audit() {
    let store = Arc::new(InMemoryStore::new());
    let p = pipeline(store.clone(), Arc::new(DownSearch), GenerationMode::Fallback);

    let err = p.search_ean("3401570052").await.unwrap_err();
    assert_eq!(err.code(), "search_provider");
    assert!(store.searches().unwrap().is_empty());
}

#[tokio::test]
async fn test_sheet_failure_keeps_product() {
    let store = Arc::new(InMemoryStore::new());
    let provider = Scripted::new(vec![Ok(product_reply()), Ok("```json\n[]\n```".into())]);
    let p = pipeline(
        store.clone(),
        Arc::new(EmptySearch),
        GenerationMode::Delegated(provider),
    );

    let err = p
        .generate(GenerateRequest {
            ean_code: "3401570052".into(),
            generate_sheet: true,
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "generation_format");
    let products = store.list_products(&ProductQuery::default()).await.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].brand, "Lacoste");
    assert!(store.list_sheets(&SheetQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_template_sheet_skips_provider() {
    let store = Arc::new(InMemoryStore::new());
    let provider = Scripted::new(vec![Ok(product_reply())]);
    let p = pipeline(
        store.clone(),
        Arc::new(EmptySearch),
        GenerationMode::Delegated(provider.clone()),
    );

    let resp = p
        .generate(GenerateRequest {
            ean_code: "3401570052".into(),
            generate_sheet: false,
        })
        .await
        .unwrap();
    assert_eq!(provider.calls(), 1);

    let sheet = p.create_sheet(&resp.product.id, false).await.unwrap();
    assert_eq!(provider.calls(), 1);
    assert_eq!(sheet.reference, "REF-01570052");
    assert_eq!(sheet.color_code, "NOI");
    assert_eq!(sheet.price_ttc, 150.0);
}

#[tokio::test]
async fn test_sheet_for_missing_product() {
    let store = Arc::new(InMemoryStore::new());
    let p = pipeline(store, Arc::new(EmptySearch), GenerationMode::Fallback);
    let err = p.create_sheet("missing", true).await.unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn test_cascade_delete_removes_all_sheets() {
    let store = Arc::new(InMemoryStore::new());
    let p = pipeline(store.clone(), Arc::new(EmptySearch), GenerationMode::Fallback);

    let resp = p
        .generate(GenerateRequest {
            ean_code: "3401570052".into(),
            generate_sheet: false,
        })
        .await
        .unwrap();
    let id = resp.product.id;

    p.create_sheet(&id, true).await.unwrap();
    p.create_sheet(&id, true).await.unwrap();

    assert_eq!(store.delete_product(&id).await.unwrap(), Some(2));
    let remaining = store
        .list_sheets(&SheetQuery {
            product_id: Some(id.clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(remaining.is_empty());
}
