//! Sales/SEO sheet generation.
//!
//! A sheet is a pure function of its product: regenerating from an unchanged
//! product never touches the product itself. As with [`crate::content`], the
//! template path and the delegated path produce the same [`SheetDraft`] shape.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::completion::{CompletionProvider, CompletionRequest, GenerationMode};
use crate::config::CatalogConfig;
use crate::content::tail_chars;
use crate::error::{CatalogError, CatalogResult};
use crate::export::{pin_prestashop_identity, PrestashopRecord, PRESTASHOP_KEY};
use crate::models::{Product, SheetDraft};
use crate::reply::{parse_reply, require_text};

/// Keys the provider must return, no more and no fewer.
pub const SHEET_KEYS: &[&str] = &[
    "title",
    "reference",
    "color_code",
    "price_ttc",
    "description",
    "characteristics",
    "seo_title",
    "seo_description",
    "export_data",
];

const REFERENCE_SUFFIX: usize = 8;
const COLOR_CODE_LEN: usize = 3;
const SEO_EXCERPT: usize = 120;
const META_DESCRIPTION_MAX: usize = 155;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SheetReply {
    title: String,
    reference: String,
    color_code: String,
    price_ttc: f64,
    description: String,
    characteristics: BTreeMap<String, String>,
    seo_title: String,
    seo_description: String,
    export_data: serde_json::Map<String, Value>,
}

#[derive(Clone)]
pub struct SheetGenerator {
    mode: GenerationMode,
    catalog: CatalogConfig,
}

impl SheetGenerator {
    pub fn new(mode: GenerationMode, catalog: CatalogConfig) -> Self {
        Self { mode, catalog }
    }

    pub fn mode(&self) -> &GenerationMode {
        &self.mode
    }

    pub async fn generate(&self, product: &Product) -> CatalogResult<SheetDraft> {
        match &self.mode {
            GenerationMode::Fallback => Ok(self.template(product)),
            GenerationMode::Delegated(provider) => self.delegate(provider.as_ref(), product).await,
        }
    }

    /// Deterministic sheet assembled from fixed section templates.
    pub fn template(&self, product: &Product) -> SheetDraft {
        let shop = &self.catalog.shop_name;
        let reference = reference_for(&product.ean_code);
        let color_code = color_code_for(&product.color);
        let price_ttc = product.price.unwrap_or(self.catalog.default_price);

        let seo_title = format!(
            "{} - {} | {} - Livraison Gratuite",
            product.title, product.brand, shop
        );
        let seo_description = format!(
            "Achetez {} de {} sur {}. {}... Livraison gratuite et retour sous 30 jours.",
            product.title,
            product.brand,
            shop,
            truncate_chars(&product.description, SEO_EXCERPT)
        );

        let record = PrestashopRecord {
            name: product.title.clone(),
            reference: reference.clone(),
            price: price_ttc,
            description: product.description.clone(),
            meta_title: format!("{} - {} | {}", product.title, product.brand, shop),
            meta_description: truncate_chars(&product.description, META_DESCRIPTION_MAX).to_string(),
            categories: vec![product.category.clone()],
            brand: product.brand.clone(),
            ean13: product.ean_code.clone(),
        };
        let mut export_data = serde_json::Map::new();
        export_data.insert(PRESTASHOP_KEY.to_string(), json!(record));

        SheetDraft {
            title: product.title.clone(),
            variants: build_variants(product, &color_code),
            reference,
            color_code,
            price_ttc,
            description: render_html(product),
            characteristics: product.characteristics.clone(),
            seo_title,
            seo_description,
            export_data,
        }
    }

    async fn delegate(
        &self,
        provider: &dyn CompletionProvider,
        product: &Product,
    ) -> CatalogResult<SheetDraft> {
        let request = CompletionRequest {
            prompt: build_sheet_prompt(product, &self.catalog.shop_name),
            temperature: 0.6,
            max_tokens: 1200,
        };

        let reply = provider.complete(&request).await.map_err(|e| {
            tracing::error!(product_id = %product.id, error = %e, "sheet generation call failed");
            CatalogError::GenerationProvider(format!("{:#}", e))
        })?;

        let parsed: SheetReply = parse_reply(&reply, SHEET_KEYS).inspect_err(|e| {
            tracing::error!(product_id = %product.id, error = %e, "sheet reply rejected");
        })?;
        require_text(&[
            ("title", &parsed.title),
            ("reference", &parsed.reference),
            ("color_code", &parsed.color_code),
            ("description", &parsed.description),
            ("seo_title", &parsed.seo_title),
            ("seo_description", &parsed.seo_description),
        ])?;

        let mut export_data = parsed.export_data;
        pin_prestashop_identity(&mut export_data, product);
        let record = export_data.get(PRESTASHOP_KEY).cloned().unwrap_or(Value::Null);
        serde_json::from_value::<PrestashopRecord>(record).map_err(|e| {
            tracing::error!(product_id = %product.id, error = %e, "sheet export record rejected");
            CatalogError::GenerationFormat(format!(
                "reply field 'export_data.{}' is incomplete: {}",
                PRESTASHOP_KEY, e
            ))
        })?;

        Ok(SheetDraft {
            title: parsed.title,
            variants: build_variants(product, &parsed.color_code),
            reference: parsed.reference,
            color_code: parsed.color_code,
            price_ttc: parsed.price_ttc,
            description: parsed.description,
            characteristics: parsed.characteristics,
            seo_title: parsed.seo_title,
            seo_description: parsed.seo_description,
            export_data,
        })
    }
}

fn reference_for(ean_code: &str) -> String {
    format!("REF-{}", tail_chars(ean_code, REFERENCE_SUFFIX))
}

fn color_code_for(color: &str) -> String {
    truncate_chars(color, COLOR_CODE_LEN).to_uppercase()
}

/// One variant per size, all in the product's color.
fn build_variants(product: &Product, color_code: &str) -> Vec<Value> {
    product
        .sizes
        .iter()
        .map(|size| {
            json!({
                "size": size,
                "color": product.color,
                "color_code": color_code,
            })
        })
        .collect()
}

/// The first `n` characters of `s`.
fn truncate_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Capitalize the first character (`"matière"` → `"Matière"`).
fn label(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_html(product: &Product) -> String {
    let items: String = product
        .characteristics
        .iter()
        .map(|(key, value)| format!("        <li><strong>{}:</strong> {}</li>\n", label(key), value))
        .collect();

    let mut html = String::from("<div class=\"product-description\">\n");
    html.push_str(&format!("    <h3>{}</h3>\n", product.title));
    html.push_str(&format!("    <p><strong>Marque:</strong> {}</p>\n", product.brand));
    html.push_str(&format!("    <p><strong>Modèle:</strong> {}</p>\n", product.model));
    html.push_str(&format!("    <p><strong>Couleur:</strong> {}</p>\n", product.color));

    html.push_str(&format!(
        "\n    <h4>Description</h4>\n    <p>{}</p>\n",
        product.description
    ));
    html.push_str(&format!(
        "\n    <h4>Caractéristiques</h4>\n    <ul>\n{}    </ul>\n",
        items
    ));
    html.push_str(&format!(
        "\n    <h4>Tailles disponibles</h4>\n    <p>{}</p>\n",
        product.sizes.join(" • ")
    ));
    html.push_str(&format!(
        "\n    <p class=\"highlight\">Code EAN: {}</p>\n</div>",
        product.ean_code
    ));
    html
}

fn build_sheet_prompt(product: &Product, shop_name: &str) -> String {
    let characteristics =
        serde_json::to_string(&product.characteristics).unwrap_or_else(|_| "{}".to_string());
    let price = product
        .price
        .map(|p| format!("{:.2}€", p))
        .unwrap_or_else(|| "non déterminé".to_string());
    let sizes = product.sizes.join(", ");

    format!(
        r#"Tu es un expert PrestaShop pour {shop_name}. Génère une fiche produit complète.

PRODUIT:
- Titre: {title}
- Marque: {brand}
- Modèle: {model}
- Couleur: {color}
- EAN: {ean}
- Catégorie: {category}
- Prix: {price}
- Description: {description}
- Caractéristiques: {characteristics}
- Tailles: {sizes}

Génère au format JSON avec exactement ces champs:

{{
  "title": "titre_optimisé_prestashop",
  "reference": "REF-code_unique",
  "color_code": "code_couleur_court",
  "price_ttc": prix_numérique,
  "description": "description_html_prestashop_formatée",
  "characteristics": {characteristics},
  "seo_title": "titre_seo_optimisé_max_70_caractères",
  "seo_description": "meta_description_max_155_caractères",
  "export_data": {{
    "prestashop_format": {{
      "name": "nom_produit",
      "reference": "référence_unique",
      "price": prix,
      "description": "description_produit",
      "meta_title": "titre_meta",
      "meta_description": "description_meta",
      "categories": ["{category}"],
      "brand": "{brand}",
      "ean13": "{ean}"
    }}
  }}
}}

RÈGLES:
- Description HTML avec balises <h3>, <p>, <ul>, <li>
- SEO optimisé pour les moteurs de recherche
- Format PrestaShop standard

JSON UNIQUEMENT:
"#,
        title = product.title,
        brand = product.brand,
        model = product.model,
        color = product.color,
        ean = product.ean_code,
        category = product.category,
        description = product.description,
    )
}
