//! Classified errors surfaced by the generation pipeline and catalog operations.
//!
//! Provider and store internals work with `anyhow::Error`; the stage that
//! calls them converts the failure into one of these variants so callers
//! (HTTP handlers, the CLI) can report a stable classification.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The search provider could not be reached or rejected the request.
    #[error("search provider error: {0}")]
    SearchProvider(String),

    /// The generation provider replied with something that is not the
    /// expected JSON object.
    #[error("generation format error: {0}")]
    GenerationFormat(String),

    /// Transport, auth or quota failure calling the generation provider.
    #[error("generation provider error: {0}")]
    GenerationProvider(String),

    #[error("persistence error: {0:#}")]
    Persistence(#[source] anyhow::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CatalogError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Machine-readable classification, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::SearchProvider(_) => "search_provider",
            CatalogError::GenerationFormat(_) => "generation_format",
            CatalogError::GenerationProvider(_) => "generation_provider",
            CatalogError::Persistence(_) => "persistence",
            CatalogError::NotFound { .. } => "not_found",
            CatalogError::InvalidInput(_) => "invalid_input",
            CatalogError::UnsupportedFormat(_) => "unsupported_format",
        }
    }
}
