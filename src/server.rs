//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/` | Service banner and provider status |
//! | `POST` | `/api/search/ean` | Search an EAN and record the evidence |
//! | `POST` | `/api/generate/product` | Full pipeline: search, product, optional sheet |
//! | `GET`  | `/api/products` | List products (`limit`, `offset`, `category`) |
//! | `POST` | `/api/products` | Create a product from manual fields |
//! | `GET`  | `/api/products/{id}` | Product detail |
//! | `PUT`  | `/api/products/{id}` | Partial product update |
//! | `DELETE` | `/api/products/{id}` | Delete a product and its sheets |
//! | `GET`  | `/api/products/{id}/sheets` | Sheets of one product |
//! | `GET`  | `/api/sheets` | List sheets (`limit`, `offset`, `status`) |
//! | `POST` | `/api/sheets` | Generate a sheet for an existing product |
//! | `GET`  | `/api/sheets/{id}` | Sheet detail |
//! | `PUT`  | `/api/sheets/{id}/status` | Change sheet status |
//! | `GET`  | `/api/sheets/{id}/export` | Export (`format=prestashop|json`) |
//! | `GET`  | `/api/stats` | Catalog statistics |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "product not found: 42" } }
//! ```
//!
//! `not_found` (404), `invalid_input` / `unsupported_format` (400),
//! `generation_format` / `generation_provider` / `search_provider` (502),
//! `persistence` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::catalog::{self, CatalogStats};
use crate::config::Config;
use crate::db;
use crate::error::CatalogError;
use crate::export::ExportFormat;
use crate::migrate;
use crate::models::{NewProduct, Product, ProductSheet, ProductUpdate, SearchRecord, SheetStatus};
use crate::pipeline::{GenerateRequest, GenerateResponse, Pipeline};
use crate::store::{ProductQuery, SheetQuery, SqliteStore, DEFAULT_LIST_LIMIT};

type AppState = Arc<Pipeline>;

/// Starts the HTTP server on `[server].bind` backed by the SQLite store.
///
/// The schema is created if missing. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let pipeline = Pipeline::from_config(config, Arc::new(SqliteStore::new(pool)))?;

    let status = pipeline.api_status();
    tracing::info!(
        generation_configured = status.generation_configured,
        search_configured = status.search_configured,
        "providers resolved"
    );

    let app = router(Arc::new(pipeline));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the API router around a pipeline.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/", get(handle_root))
        .route("/api/search/ean", post(handle_search))
        .route("/api/generate/product", post(handle_generate))
        .route(
            "/api/products",
            get(handle_list_products).post(handle_create_product),
        )
        .route(
            "/api/products/{id}",
            get(handle_get_product)
                .put(handle_update_product)
                .delete(handle_delete_product),
        )
        .route("/api/products/{id}/sheets", get(handle_product_sheets))
        .route("/api/sheets", get(handle_list_sheets).post(handle_create_sheet))
        .route("/api/sheets/{id}", get(handle_get_sheet))
        .route("/api/sheets/{id}/status", put(handle_sheet_status))
        .route("/api/sheets/{id}/export", get(handle_export))
        .route("/api/stats", get(handle_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(pipeline)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::NotFound { .. } => StatusCode::NOT_FOUND,
            CatalogError::InvalidInput(_) | CatalogError::UnsupportedFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            CatalogError::GenerationFormat(_)
            | CatalogError::GenerationProvider(_)
            | CatalogError::SearchProvider(_) => StatusCode::BAD_GATEWAY,
            CatalogError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ Service ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_root(State(pipeline): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Product sheet generator API",
        "version": env!("CARGO_PKG_VERSION"),
        "api_status": pipeline.api_status(),
    }))
}

// ============ Pipeline ============

#[derive(Deserialize)]
struct SearchRequest {
    ean_code: String,
}

async fn handle_search(
    State(pipeline): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<SearchRecord> {
    Ok(Json(pipeline.search_ean(&req.ean_code).await?))
}

async fn handle_generate(
    State(pipeline): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<GenerateResponse> {
    Ok(Json(pipeline.generate(req).await?))
}

// ============ Products ============

#[derive(Deserialize)]
struct ProductListParams {
    limit: Option<i64>,
    offset: Option<i64>,
    category: Option<String>,
}

async fn handle_list_products(
    State(pipeline): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> ApiResult<Vec<Product>> {
    let query = ProductQuery {
        limit: params.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        offset: params.offset.unwrap_or(0),
        category: params.category,
    };
    Ok(Json(catalog::list_products(pipeline.store(), &query).await?))
}

async fn handle_create_product(
    State(pipeline): State<AppState>,
    Json(new): Json<NewProduct>,
) -> ApiResult<Product> {
    Ok(Json(catalog::create_product(pipeline.store(), new).await?))
}

async fn handle_get_product(
    State(pipeline): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Product> {
    Ok(Json(catalog::get_product(pipeline.store(), &id).await?))
}

async fn handle_update_product(
    State(pipeline): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ProductUpdate>,
) -> ApiResult<Product> {
    Ok(Json(
        catalog::update_product(pipeline.store(), &id, update).await?,
    ))
}

async fn handle_delete_product(
    State(pipeline): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let removed = catalog::delete_product(pipeline.store(), &id).await?;
    Ok(Json(json!({
        "message": "Product deleted",
        "id": id,
        "sheets_deleted": removed,
    })))
}

async fn handle_product_sheets(
    State(pipeline): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<ProductSheet>> {
    Ok(Json(catalog::product_sheets(pipeline.store(), &id).await?))
}

// ============ Sheets ============

#[derive(Deserialize)]
struct SheetListParams {
    limit: Option<i64>,
    offset: Option<i64>,
    status: Option<String>,
    product_id: Option<String>,
}

async fn handle_list_sheets(
    State(pipeline): State<AppState>,
    Query(params): Query<SheetListParams>,
) -> ApiResult<Vec<ProductSheet>> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<SheetStatus>)
        .transpose()?;
    let query = SheetQuery {
        limit: params.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        offset: params.offset.unwrap_or(0),
        status,
        product_id: params.product_id,
    };
    Ok(Json(catalog::list_sheets(pipeline.store(), &query).await?))
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct CreateSheetRequest {
    product_id: String,
    #[serde(default = "default_true")]
    generate_with_ai: bool,
}

async fn handle_create_sheet(
    State(pipeline): State<AppState>,
    Json(req): Json<CreateSheetRequest>,
) -> ApiResult<ProductSheet> {
    Ok(Json(
        pipeline
            .create_sheet(&req.product_id, req.generate_with_ai)
            .await?,
    ))
}

async fn handle_get_sheet(
    State(pipeline): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ProductSheet> {
    Ok(Json(catalog::get_sheet(pipeline.store(), &id).await?))
}

#[derive(Deserialize)]
struct StatusRequest {
    status: String,
}

async fn handle_sheet_status(
    State(pipeline): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<ProductSheet> {
    let status: SheetStatus = req.status.parse()?;
    Ok(Json(
        catalog::set_sheet_status(pipeline.store(), &id, status).await?,
    ))
}

#[derive(Deserialize)]
struct ExportParams {
    format: Option<String>,
}

async fn handle_export(
    State(pipeline): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ExportParams>,
) -> ApiResult<Value> {
    let format: ExportFormat = params.format.as_deref().unwrap_or("prestashop").parse()?;
    Ok(Json(catalog::export(pipeline.store(), &id, format).await?))
}

// ============ Stats ============

async fn handle_stats(State(pipeline): State<AppState>) -> ApiResult<CatalogStats> {
    Ok(Json(
        catalog::stats(pipeline.store(), pipeline.api_status()).await?,
    ))
}
