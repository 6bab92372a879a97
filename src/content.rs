//! Product content generation.
//!
//! Turns an EAN and its [`SearchEvidence`] into a [`ProductDraft`]. Two
//! implementations satisfy the same output contract:
//!
//! - **Template** ([`GenerationMode::Fallback`]): deterministic heuristics
//!   over the evidence. Identical inputs always produce identical drafts.
//! - **Delegated** ([`GenerationMode::Delegated`]): one prompt to the
//!   completion provider, whose reply must be a strict JSON object with the
//!   keys listed in [`PRODUCT_KEYS`].
//!
//! Empty evidence is valid input for both paths.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::completion::{CompletionProvider, CompletionRequest, GenerationMode};
use crate::config::CatalogConfig;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{default_weight_table, ProductDraft, SearchEvidence};
use crate::reply::{parse_reply, require_text};

/// Keys the provider must return, no more and no fewer.
pub const PRODUCT_KEYS: &[&str] = &[
    "title",
    "brand",
    "model",
    "color",
    "category",
    "price",
    "description",
    "characteristics",
    "sizes",
    "weight_by_type",
];

/// Brand substrings searched in result titles, in priority order.
const KNOWN_BRANDS: &[(&str, &str)] = &[
    ("adidas", "Adidas"),
    ("lacoste", "Lacoste"),
    ("hugo", "Hugo Boss"),
];

const FOOTWEAR_CATEGORY: &str = "Chaussures";
const FOOTWEAR_SIZES: &[&str] = &["36", "37", "38", "39", "40", "41", "42", "43", "44", "45"];
const APPAREL_SIZES: &[&str] = &["XS", "S", "M", "L", "XL", "XXL"];

const DEFAULT_COLOR: &str = "Noir";

const PROMPT_TITLES: usize = 5;
const PROMPT_DESCRIPTIONS: usize = 3;
const PROMPT_URLS: usize = 3;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProductReply {
    title: String,
    brand: String,
    model: String,
    color: String,
    category: String,
    price: Option<f64>,
    description: String,
    characteristics: BTreeMap<String, String>,
    sizes: Vec<String>,
    weight_by_type: BTreeMap<String, f64>,
}

impl ProductReply {
    fn into_draft(self) -> ProductDraft {
        ProductDraft {
            title: self.title,
            brand: self.brand,
            model: self.model,
            color: self.color,
            category: self.category,
            price: self.price,
            description: self.description,
            characteristics: self.characteristics,
            sizes: self.sizes,
            weight_by_type: self.weight_by_type,
            images: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct ContentGenerator {
    mode: GenerationMode,
    catalog: CatalogConfig,
}

impl ContentGenerator {
    pub fn new(mode: GenerationMode, catalog: CatalogConfig) -> Self {
        Self { mode, catalog }
    }

    pub fn mode(&self) -> &GenerationMode {
        &self.mode
    }

    pub async fn generate(
        &self,
        ean_code: &str,
        evidence: &SearchEvidence,
    ) -> CatalogResult<ProductDraft> {
        match &self.mode {
            GenerationMode::Fallback => Ok(self.template(ean_code, evidence)),
            GenerationMode::Delegated(provider) => {
                self.delegate(provider.as_ref(), ean_code, evidence).await
            }
        }
    }

    /// Deterministic product draft built from the evidence and shop defaults.
    pub fn template(&self, ean_code: &str, evidence: &SearchEvidence) -> ProductDraft {
        let brand = detect_brand(&evidence.titles)
            .map(str::to_string)
            .unwrap_or_else(|| self.catalog.fallback_brand.clone());

        let category = if evidence.detected_category.is_empty() {
            self.catalog.default_category.clone()
        } else {
            evidence.detected_category.clone()
        };

        let price = match evidence.prices.first() {
            Some(raw) => parse_price(raw).unwrap_or_else(|| {
                tracing::debug!(raw = %raw, "unparseable price, using default");
                self.catalog.default_price
            }),
            None => self.catalog.default_price,
        };

        let description = format!(
            "Découvrez ce magnifique produit {brand} de catégorie {category}. Conçu avec des matériaux de qualité premium, ce produit allie style et performance. Le code EAN {ean_code} garantit l'authenticité. Parfait pour un usage quotidien ou sportif, il s'adapte à toutes les occasions. Design moderne et confortable, disponible en plusieurs tailles."
        );

        let characteristics: BTreeMap<String, String> = [
            ("marque", brand.as_str()),
            ("couleur", DEFAULT_COLOR),
            ("matière", "Synthétique et textile"),
            ("saison", "Toute saison"),
            ("style", "Sport/Streetwear"),
            ("origine", "Import"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let sizes = if category == FOOTWEAR_CATEGORY {
            FOOTWEAR_SIZES
        } else {
            APPAREL_SIZES
        };

        ProductDraft {
            title: format!("{} {} Premium - EAN {}", category, brand, ean_code),
            model: format!("Modèle {}", tail_chars(ean_code, 4)),
            color: DEFAULT_COLOR.to_string(),
            brand,
            category,
            price: Some(price),
            description,
            characteristics,
            sizes: sizes.iter().map(|s| s.to_string()).collect(),
            weight_by_type: default_weight_table(),
            images: Vec::new(),
        }
    }

    async fn delegate(
        &self,
        provider: &dyn CompletionProvider,
        ean_code: &str,
        evidence: &SearchEvidence,
    ) -> CatalogResult<ProductDraft> {
        let request = CompletionRequest {
            prompt: build_product_prompt(ean_code, evidence, &self.catalog.shop_name),
            temperature: 0.7,
            max_tokens: 1000,
        };

        let reply = provider.complete(&request).await.map_err(|e| {
            tracing::error!(ean = %ean_code, error = %e, "product generation call failed");
            CatalogError::GenerationProvider(format!("{:#}", e))
        })?;

        let parsed: ProductReply = parse_reply(&reply, PRODUCT_KEYS).inspect_err(|e| {
            tracing::error!(ean = %ean_code, error = %e, "product reply rejected");
        })?;
        require_text(&[
            ("title", &parsed.title),
            ("brand", &parsed.brand),
            ("model", &parsed.model),
            ("color", &parsed.color),
            ("category", &parsed.category),
            ("description", &parsed.description),
        ])?;

        Ok(parsed.into_draft())
    }
}

/// First known brand found in any title, case-insensitively.
fn detect_brand(titles: &[String]) -> Option<&'static str> {
    let lowered: Vec<String> = titles.iter().map(|t| t.to_lowercase()).collect();
    KNOWN_BRANDS
        .iter()
        .find(|(needle, _)| lowered.iter().any(|t| t.contains(needle)))
        .map(|(_, brand)| *brand)
}

/// First numeric token of a raw price string (`"179,99 €"` → `179.99`).
pub fn parse_price(raw: &str) -> Option<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());
    re.find(raw)
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
}

/// The last `n` characters of `s` (all of it when shorter).
pub(crate) fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn build_product_prompt(ean_code: &str, evidence: &SearchEvidence, shop_name: &str) -> String {
    let titles = take_lines(&evidence.titles, PROMPT_TITLES);
    let descriptions = take_lines(&evidence.descriptions, PROMPT_DESCRIPTIONS);
    let urls = take_lines(&evidence.source_urls, PROMPT_URLS);
    let brands = evidence.distinct_brands().join(", ");
    let category = if evidence.detected_category.is_empty() {
        "Non déterminée"
    } else {
        evidence.detected_category.as_str()
    };

    format!(
        r#"Tu es un expert en e-commerce spécialisé dans la création de fiches produits pour une boutique de sport style {shop_name}.

CODE EAN À ANALYSER: {ean_code}

INFORMATIONS TROUVÉES PAR LA RECHERCHE:

Titres des résultats:
{titles}

Descriptions:
{descriptions}

Marques détectées: {brands}

URLs sources:
{urls}

CATÉGORIE POTENTIELLE: {category}

MISSION:
Génère un produit e-commerce complet au format JSON strict avec exactement ces champs:

{{
  "title": "Titre produit structuré: [Catégorie] [Marque] [Modèle] - [Couleur]",
  "brand": "Marque principale du produit",
  "model": "Nom/modèle précis du produit",
  "color": "Couleur principale",
  "category": "Catégorie principale (Chaussures/Vêtements/Accessoires/Maroquinerie)",
  "price": prix_numérique_sans_devise_ou_null,
  "description": "Description vendeuse de 250-400 mots, optimisée pour la vente en ligne",
  "characteristics": {{
    "marque": "nom_marque",
    "couleur": "couleur_principale",
    "matière": "matériaux_utilisés",
    "saison": "saison_appropriée",
    "style": "style_vestimentaire",
    "origine": "pays_origine_ou_import"
  }},
  "sizes": ["liste", "des", "tailles", "disponibles"],
  "weight_by_type": {{
    "baskets": 1.0,
    "ensemble": 0.75,
    "sweat": 0.5,
    "t-shirt": 0.25,
    "maroquinerie": 0.3
  }}
}}

RÈGLES IMPORTANTES:
- Utilise UNIQUEMENT les informations des résultats de recherche
- Si une info manque, déduis intelligemment du contexte
- Prix réaliste pour le marché français
- Tailles adaptées au type de produit

RÉPONDS UNIQUEMENT EN JSON VALIDE, SANS AUTRE TEXTE.
"#
    )
}

fn take_lines(values: &[String], n: usize) -> String {
    values
        .iter()
        .take(n)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Scripted {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(msg: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(msg.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn fallback() -> ContentGenerator {
        ContentGenerator::new(GenerationMode::Fallback, CatalogConfig::default())
    }

    fn valid_reply() -> String {
        serde_json::json!({
            "title": "Chaussures Adidas Samba - Blanc",
            "brand": "Adidas",
            "model": "Samba",
            "color": "Blanc",
            "category": "Chaussures",
            "price": 110.0,
            "description": "Une basket iconique.",
            "characteristics": {"marque": "Adidas", "couleur": "Blanc", "matière": "Cuir", "saison": "Toute saison"},
            "sizes": ["40", "41"],
            "weight_by_type": {"baskets": 1.0}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_empty_evidence_uses_defaults() {
        let draft = fallback()
            .generate("3401570052", &SearchEvidence::default())
            .await
            .unwrap();
        assert_eq!(draft.category, "Chaussures");
        assert_eq!(draft.brand, "Nike");
        assert_eq!(draft.price, Some(99.99));
        assert_eq!(draft.weight_by_type, default_weight_table());
        assert_eq!(draft.title, "Chaussures Nike Premium - EAN 3401570052");
        assert_eq!(draft.model, "Modèle 0052");
        assert_eq!(draft.sizes.first().map(String::as_str), Some("36"));
        assert_eq!(draft.sizes.len(), 10);
        for key in ["marque", "couleur", "matière", "saison", "style", "origine"] {
            assert!(draft.characteristics.contains_key(key), "missing {}", key);
        }
        for field in [&draft.title, &draft.brand, &draft.model, &draft.color, &draft.category] {
            assert!(!field.is_empty());
        }
    }

    #[test]
    fn test_template_is_deterministic() {
        let evidence = SearchEvidence {
            titles: vec!["Polo LACOSTE homme".into()],
            prices: vec!["89,90 €".into()],
            detected_category: "Vêtements".into(),
            ..Default::default()
        };
        let generator = fallback();
        let a = generator.template("1234567890123", &evidence);
        let b = generator.template("1234567890123", &evidence);
        assert_eq!(a, b);
        assert_eq!(a.brand, "Lacoste");
        assert_eq!(a.price, Some(89.90));
        assert_eq!(a.sizes, vec!["XS", "S", "M", "L", "XL", "XXL"]);
    }

    #[test]
    fn test_brand_priority_order() {
        let titles = vec!["Hugo shirt".to_string(), "adidas Samba".to_string()];
        assert_eq!(detect_brand(&titles), Some("Adidas"));
        assert_eq!(detect_brand(&["plain".to_string()]), None);
    }

    #[test]
    fn test_unparseable_price_falls_back() {
        let evidence = SearchEvidence {
            prices: vec!["sur demande".into()],
            ..Default::default()
        };
        let draft = fallback().template("42", &evidence);
        assert_eq!(draft.price, Some(99.99));
        assert_eq!(draft.model, "Modèle 42");
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("179.99"), Some(179.99));
        assert_eq!(parse_price("EUR 59"), Some(59.0));
        assert_eq!(parse_price("12,50€"), Some(12.5));
        assert_eq!(parse_price("gratuit"), None);
    }

    #[test]
    fn test_tail_chars_multibyte() {
        assert_eq!(tail_chars("ééééé", 2), "éé");
        assert_eq!(tail_chars("abc", 8), "abc");
    }

    #[tokio::test]
    async fn test_delegated_parses_fenced_reply() {
        let provider = Scripted::ok(&format!("```json\n{}\n```", valid_reply()));
        let generator = ContentGenerator::new(
            GenerationMode::Delegated(provider.clone()),
            CatalogConfig::default(),
        );
        let evidence = SearchEvidence {
            titles: (0..8).map(|i| format!("title {}", i)).collect(),
            brands: vec!["Adidas".into(), "Adidas".into()],
            ..Default::default()
        };
        let draft = generator.generate("4060512345678", &evidence).await.unwrap();
        assert_eq!(draft.brand, "Adidas");
        assert_eq!(draft.price, Some(110.0));
        assert!(draft.images.is_empty());

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("4060512345678"));
        assert!(prompts[0].contains("title 4"));
        assert!(!prompts[0].contains("title 5"));
        assert!(prompts[0].contains("Marques détectées: Adidas\n"));
        assert!(prompts[0].contains("CATÉGORIE POTENTIELLE: Non déterminée"));
    }

    #[tokio::test]
    async fn test_delegated_not_json_is_format_error() {
        let generator = ContentGenerator::new(
            GenerationMode::Delegated(Scripted::ok("not json")),
            CatalogConfig::default(),
        );
        let err = generator
            .generate("3401570052", &SearchEvidence::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::GenerationFormat(_)));
    }

    #[tokio::test]
    async fn test_delegated_blank_brand_is_format_error() {
        let reply = valid_reply().replace("\"brand\":\"Adidas\"", "\"brand\":\"\"");
        let generator = ContentGenerator::new(
            GenerationMode::Delegated(Scripted::ok(&reply)),
            CatalogConfig::default(),
        );
        let err = generator
            .generate("3401570052", &SearchEvidence::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("brand"));
    }

    #[tokio::test]
    async fn test_provider_failure_is_provider_error() {
        let generator = ContentGenerator::new(
            GenerationMode::Delegated(Scripted::failing("429 quota exceeded")),
            CatalogConfig::default(),
        );
        let err = generator
            .generate("3401570052", &SearchEvidence::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "generation_provider");
        assert!(err.to_string().contains("quota"));
    }
}
