//! Web search providers used to gather evidence about an EAN.
//!
//! - **[`SimulatedSearch`]**: returns a fixed, realistic payload; used when no
//!   search credentials are configured so the whole pipeline runs offline.
//! - **[`GoogleSearch`]**: queries the Google Custom Search JSON API.
//!
//! Providers return the raw result items untouched; turning them into
//! evidence is the job of [`crate::extract`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::SearchConfig;

const GOOGLE_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Pause between consecutive queries for the same EAN.
const QUERY_PAUSE: Duration = Duration::from_millis(100);

/// Raw provider payload for one EAN lookup.
#[derive(Debug, Clone, Serialize)]
pub struct RawSearchResponse {
    /// The first query sent for the lookup, recorded for auditing.
    pub query: String,
    pub items: Vec<Value>,
    /// Number of items the provider returned before truncation.
    pub total_results: usize,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, ean_code: &str) -> Result<RawSearchResponse>;
}

/// Build the provider selected by `[search].provider`.
pub fn create_search_provider(config: &SearchConfig) -> Result<Arc<dyn SearchProvider>> {
    match config.provider.as_str() {
        "simulated" => Ok(Arc::new(SimulatedSearch)),
        "google" => Ok(Arc::new(GoogleSearch::from_config(config)?)),
        other => bail!("Unknown search provider: {}", other),
    }
}

// ============ Simulated ============

pub struct SimulatedSearch;

#[async_trait]
impl SearchProvider for SimulatedSearch {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn search(&self, ean_code: &str) -> Result<RawSearchResponse> {
        let items = vec![
            json!({
                "title": format!("Nike Air Max 97 - EAN {}", ean_code),
                "snippet": format!(
                    "Découvrez les Nike Air Max 97 avec le code EAN {}. Chaussures de sport premium avec technologie Air visible. Disponibles en plusieurs coloris et tailles.",
                    ean_code
                ),
                "link": format!("https://www.nike.com/fr/product/{}", ean_code),
                "pagemap": {
                    "product": [{
                        "name": "Nike Air Max 97",
                        "brand": "Nike",
                        "price": "179.99"
                    }]
                }
            }),
            json!({
                "title": format!("Baskets Nike Air Max - {} | Zalando", ean_code),
                "snippet": format!(
                    "Nike Air Max disponibles sur Zalando. Code EAN {}. Livraison gratuite. Retours gratuits pendant 100 jours.",
                    ean_code
                ),
                "link": format!("https://www.zalando.fr/nike-air-max-{}", ean_code),
                "pagemap": {}
            }),
            json!({
                "title": format!("Produit {} - Specifications", ean_code),
                "snippet": format!(
                    "Caractéristiques détaillées du produit {}: matériaux, couleurs disponibles, guide des tailles.",
                    ean_code
                ),
                "link": format!("https://www.produit-specs.com/{}", ean_code),
                "pagemap": {}
            }),
        ];

        Ok(RawSearchResponse {
            query: format!("{} produit caractéristiques", ean_code),
            total_results: items.len(),
            items,
        })
    }
}

// ============ Google Custom Search ============

/// Google Custom Search provider.
///
/// Issues three complementary queries per EAN and keeps the first
/// `max_results` items across all of them. Any transport or HTTP failure
/// aborts the lookup; there is no retry.
pub struct GoogleSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    cx: String,
    results_per_query: usize,
    max_results: usize,
}

impl GoogleSearch {
    /// Reads the API key and engine id from the environment variables named in config.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} environment variable not set", config.api_key_env))?;
        let cx = std::env::var(&config.cx_env)
            .with_context(|| format!("{} environment variable not set", config.cx_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: GOOGLE_ENDPOINT.to_string(),
            api_key,
            cx,
            results_per_query: config.results_per_query,
            max_results: config.max_results,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn queries(ean_code: &str) -> [String; 3] {
        [
            format!("{} produit caractéristiques prix", ean_code),
            format!("{} marque modèle couleur", ean_code),
            format!("EAN {} specifications", ean_code),
        ]
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(&self, ean_code: &str) -> Result<RawSearchResponse> {
        let mut all_items: Vec<Value> = Vec::new();
        let num = self.results_per_query.to_string();
        let queries = Self::queries(ean_code);

        for (i, query) in queries.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(QUERY_PAUSE).await;
            }

            let response = self
                .client
                .get(&self.endpoint)
                .query(&[
                    ("key", self.api_key.as_str()),
                    ("cx", self.cx.as_str()),
                    ("q", query.as_str()),
                    ("num", num.as_str()),
                ])
                .send()
                .await
                .context("Google Search request failed")?;

            let status = response.status();
            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                bail!("Google Search API error {}: {}", status, body_text);
            }

            let json: Value = response
                .json()
                .await
                .context("Google Search returned invalid JSON")?;
            if let Some(items) = json.get("items").and_then(|i| i.as_array()) {
                all_items.extend(items.iter().cloned());
            }
            tracing::debug!(query = %query, total = all_items.len(), "google search query done");
        }

        let total_results = all_items.len();
        all_items.truncate(self.max_results);

        let [first, ..] = queries;
        Ok(RawSearchResponse {
            query: first,
            items: all_items,
            total_results,
        })
    }
}
