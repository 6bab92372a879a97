//! Generation pipeline: EAN → search evidence → product → optional sheet.
//!
//! ```text
//! Received(ean) → Searched(evidence) → Enriched(product) → [Sheeted(sheet)] → Completed
//! ```
//!
//! Stages run sequentially and are never retried. A failing stage aborts the
//! run and its classified error is returned unchanged. The search audit
//! record is written before enrichment, so it stays behind even when a later
//! stage fails; the product and sheet inserts are independent writes.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::catalog::ApiStatus;
use crate::completion::{create_generation_mode, GenerationMode};
use crate::config::{CatalogConfig, Config};
use crate::content::ContentGenerator;
use crate::error::{CatalogError, CatalogResult};
use crate::extract::extract_evidence;
use crate::models::{Product, ProductSheet, SearchEvidence, SearchRecord};
use crate::search::{create_search_provider, SearchProvider};
use crate::sheet::SheetGenerator;
use crate::store::Store;

fn default_true() -> bool {
    true
}

/// Input of [`Pipeline::generate`].
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub ean_code: String,
    #[serde(default = "default_true")]
    pub generate_sheet: bool,
}

/// Informational digest of the search stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSummary {
    pub results_count: usize,
    /// Items the provider returned before truncation.
    pub total_results: usize,
    pub brands_found: Vec<String>,
    pub category_detected: String,
}

/// Composite result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub product: Product,
    pub product_sheet: Option<ProductSheet>,
    pub search_summary: SearchSummary,
}

pub struct Pipeline {
    store: Arc<dyn Store>,
    search: Arc<dyn SearchProvider>,
    content: ContentGenerator,
    sheets: SheetGenerator,
    template_sheets: SheetGenerator,
    search_live: bool,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn Store>,
        search: Arc<dyn SearchProvider>,
        mode: GenerationMode,
        catalog: CatalogConfig,
    ) -> Self {
        Self {
            store,
            search,
            content: ContentGenerator::new(mode.clone(), catalog.clone()),
            sheets: SheetGenerator::new(mode, catalog.clone()),
            template_sheets: SheetGenerator::new(GenerationMode::Fallback, catalog),
            search_live: false,
        }
    }

    /// Resolve providers from configuration. Fails when a selected provider
    /// is missing its credentials.
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Result<Self> {
        let mode = create_generation_mode(&config.generation)?;
        let search = create_search_provider(&config.search)?;
        let mut pipeline = Self::new(store, search, mode, config.catalog.clone());
        pipeline.search_live = config.search.is_live();
        Ok(pipeline)
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn api_status(&self) -> ApiStatus {
        ApiStatus {
            generation_configured: self.content.mode().is_delegated(),
            search_configured: self.search_live,
        }
    }

    /// Search an EAN, extract evidence and persist the audit record.
    pub async fn search_ean(&self, ean_code: &str) -> CatalogResult<SearchRecord> {
        let ean_code = normalize_ean(ean_code)?;
        let (record, _) = self.search_stage(&ean_code).await?;
        Ok(record)
    }

    /// Run the full pipeline for one EAN.
    pub async fn generate(&self, request: GenerateRequest) -> CatalogResult<GenerateResponse> {
        let ean_code = normalize_ean(&request.ean_code)?;

        let (record, search_summary) = self.search_stage(&ean_code).await?;

        let draft = self.content.generate(&ean_code, &record.evidence).await?;
        let search_source = format!("Google Search - {} résultats", search_summary.results_count);
        let product = Product::from_draft(&ean_code, draft, Some(search_source));
        self.store
            .insert_product(&product)
            .await
            .map_err(CatalogError::Persistence)?;
        tracing::info!(
            ean = %ean_code,
            product_id = %product.id,
            brand = %product.brand,
            category = %product.category,
            "enriched"
        );

        let product_sheet = if request.generate_sheet {
            Some(self.build_sheet(&self.sheets, &product).await?)
        } else {
            None
        };

        Ok(GenerateResponse {
            success: true,
            search_summary,
            product,
            product_sheet,
        })
    }

    /// Generate a new sheet for a stored product. With `generate_with_ai`
    /// false the template path is used even if a provider is configured.
    pub async fn create_sheet(
        &self,
        product_id: &str,
        generate_with_ai: bool,
    ) -> CatalogResult<ProductSheet> {
        let product = self
            .store
            .get_product(product_id)
            .await
            .map_err(CatalogError::Persistence)?
            .ok_or_else(|| CatalogError::not_found("product", product_id))?;

        let generator = if generate_with_ai {
            &self.sheets
        } else {
            &self.template_sheets
        };
        self.build_sheet(generator, &product).await
    }

    async fn search_stage(&self, ean_code: &str) -> CatalogResult<(SearchRecord, SearchSummary)> {
        let response = self.search.search(ean_code).await.map_err(|e| {
            tracing::error!(ean = %ean_code, provider = self.search.name(), error = %e, "search failed");
            CatalogError::SearchProvider(format!("{:#}", e))
        })?;

        let evidence = extract_evidence(&response);
        let summary = summarize(response.items.len(), response.total_results, &evidence);
        let record = SearchRecord::new(ean_code, response.query, response.items, evidence);
        self.store
            .insert_search(&record)
            .await
            .map_err(CatalogError::Persistence)?;
        tracing::info!(
            ean = %ean_code,
            provider = self.search.name(),
            results = summary.results_count,
            total = summary.total_results,
            category = %record.evidence.detected_category,
            "searched"
        );
        Ok((record, summary))
    }

    async fn build_sheet(
        &self,
        generator: &SheetGenerator,
        product: &Product,
    ) -> CatalogResult<ProductSheet> {
        let draft = generator.generate(product).await?;
        let sheet = ProductSheet::from_draft(product, draft);
        self.store
            .insert_sheet(&sheet)
            .await
            .map_err(CatalogError::Persistence)?;
        tracing::info!(
            product_id = %product.id,
            sheet_id = %sheet.id,
            mode = %generator.mode().describe(),
            "sheeted"
        );
        Ok(sheet)
    }
}

fn normalize_ean(raw: &str) -> CatalogResult<String> {
    let ean = raw.trim();
    if ean.is_empty() {
        return Err(CatalogError::InvalidInput("ean_code must not be empty".into()));
    }
    Ok(ean.to_string())
}

fn summarize(results_count: usize, total_results: usize, evidence: &SearchEvidence) -> SearchSummary {
    SearchSummary {
        results_count,
        total_results,
        brands_found: evidence.distinct_brands(),
        category_detected: evidence.detected_category.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ean() {
        assert_eq!(normalize_ean(" 3401570052 ").unwrap(), "3401570052");
        assert_eq!(normalize_ean("   ").unwrap_err().code(), "invalid_input");
    }

    #[test]
    fn test_generate_request_defaults_to_sheet() {
        let req: GenerateRequest = serde_json::from_str(r#"{"ean_code": "123"}"#).unwrap();
        assert!(req.generate_sheet);
    }

    #[test]
    fn test_summary_dedups_brands() {
        let evidence = SearchEvidence {
            brands: vec!["Nike".into(), "Adidas".into(), "Nike".into()],
            detected_category: "Chaussures".into(),
            ..Default::default()
        };
        let summary = summarize(3, 7, &evidence);
        assert_eq!(summary.results_count, 3);
        assert_eq!(summary.total_results, 7);
        assert_eq!(summary.brands_found, vec!["Nike", "Adidas"]);
        assert_eq!(summary.category_detected, "Chaussures");
    }
}
