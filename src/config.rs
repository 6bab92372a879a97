use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8001".to_string()
}

/// Text-generation provider settings.
///
/// `provider = "disabled"` selects the deterministic template path for both
/// product and sheet generation.
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            base_url: default_openai_base_url(),
            api_key_env: default_openai_key_env(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_generation_provider() -> String {
    "disabled".to_string()
}
fn default_generation_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: String,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_cx_env")]
    pub cx_env: String,
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key_env: default_search_key_env(),
            cx_env: default_search_cx_env(),
            results_per_query: default_results_per_query(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_provider() -> String {
    "simulated".to_string()
}
fn default_search_key_env() -> String {
    "GOOGLE_SEARCH_API_KEY".to_string()
}
fn default_search_cx_env() -> String {
    "GOOGLE_SEARCH_CX".to_string()
}
fn default_results_per_query() -> usize {
    5
}
fn default_max_results() -> usize {
    10
}
fn default_search_timeout() -> u64 {
    10
}

impl SearchConfig {
    pub fn is_live(&self) -> bool {
        self.provider != "simulated"
    }
}

/// Shop-level defaults used by the template generators.
#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_shop_name")]
    pub shop_name: String,
    #[serde(default = "default_fallback_brand")]
    pub fallback_brand: String,
    #[serde(default = "default_category")]
    pub default_category: String,
    #[serde(default = "default_price")]
    pub default_price: f64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            shop_name: default_shop_name(),
            fallback_brand: default_fallback_brand(),
            default_category: default_category(),
            default_price: default_price(),
        }
    }
}

fn default_shop_name() -> String {
    "DM'Sports".to_string()
}
fn default_fallback_brand() -> String {
    "Nike".to_string()
}
fn default_category() -> String {
    "Chaussures".to_string()
}
fn default_price() -> f64 {
    99.99
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.generation.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    match config.search.provider.as_str() {
        "simulated" | "google" => {}
        other => anyhow::bail!(
            "Unknown search provider: '{}'. Must be simulated or google.",
            other
        ),
    }

    if config.search.results_per_query == 0 {
        anyhow::bail!("search.results_per_query must be >= 1");
    }
    if config.search.max_results == 0 {
        anyhow::bail!("search.max_results must be >= 1");
    }

    let price = config.catalog.default_price;
    if price.is_nan() || price <= 0.0 {
        anyhow::bail!("catalog.default_price must be > 0");
    }
    if config.catalog.shop_name.trim().is_empty() {
        anyhow::bail!("catalog.shop_name must not be empty");
    }
    if config.catalog.fallback_brand.trim().is_empty() {
        anyhow::bail!("catalog.fallback_brand must not be empty");
    }
    if config.catalog.default_category.trim().is_empty() {
        anyhow::bail!("catalog.default_category must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &str) -> Result<Config> {
        let content = format!("[db]\npath = \"/tmp/psg.sqlite\"\n{}", extra);
        let config: Config = toml::from_str(&content)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8001");
        assert_eq!(config.generation.provider, "disabled");
        assert!(!config.search.is_live());
        assert_eq!(config.catalog.fallback_brand, "Nike");
        assert_eq!(config.catalog.default_category, "Chaussures");
        assert_eq!(config.catalog.default_price, 99.99);
        assert_eq!(config.search.max_results, 10);
    }

    #[test]
    fn test_unknown_generation_provider_rejected() {
        let err = parse("[generation]\nprovider = \"mystery\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown generation provider"));
    }

    #[test]
    fn test_unknown_search_provider_rejected() {
        let err = parse("[search]\nprovider = \"bing\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown search provider"));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let err = parse("[catalog]\ndefault_price = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("default_price"));
    }

    #[test]
    fn test_empty_fallback_brand_rejected() {
        let err = parse("[catalog]\nfallback_brand = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("fallback_brand"));
    }

    #[test]
    fn test_zero_max_results_rejected() {
        assert!(parse("[search]\nmax_results = 0\n").is_err());
    }
}
