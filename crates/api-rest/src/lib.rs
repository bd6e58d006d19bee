//! # API REST
//!
//! REST API for the clinical attention workflow.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - Mapping of workflow and storage errors onto HTTP status codes
//!
//! Uses `api-shared` for the JSON types and `ulr-core` for everything else. The router is built
//! by [`router`] so that the `ulr-run` binary and tests serve the exact same surface.

#![warn(rust_2018_idioms)]

mod error;
mod handlers;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use ulr_core::{AttentionLocks, CoreConfig};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::ApiError;
pub use handlers::ListAttentionsParams;

/// Shared state for every request handler.
///
/// The lock registry must be shared by every handler touching the same data directory,
/// otherwise concurrent transitions on one episode are no longer serialised.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub locks: Arc<AttentionLocks>,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            cfg,
            locks: Arc::new(AttentionLocks::new()),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_attentions,
        handlers::create_attention,
        handlers::attention_summary,
        handlers::get_attention,
        handlers::patch_attention,
        handlers::attention_history,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::HealthResponse,
        api_shared::AttentionDto,
        api_shared::AttentionResponse,
        api_shared::AttentionListResponse,
        api_shared::CreateAttentionReq,
        api_shared::PatchAttentionReq,
        api_shared::SummaryDto,
        api_shared::SummaryResponse,
        api_shared::HistoryEntryDto,
        api_shared::HistoryDto,
        api_shared::HistoryResponse,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/clinical_attentions",
            get(handlers::list_attentions).post(handlers::create_attention),
        )
        .route(
            "/clinical_attentions/summary",
            get(handlers::attention_summary),
        )
        .route(
            "/clinical_attentions/:id",
            get(handlers::get_attention).patch(handlers::patch_attention),
        )
        .route(
            "/clinical_attentions/:id/history",
            get(handlers::attention_history),
        )
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
