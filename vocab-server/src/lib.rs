//! vocab-server library - vocabulary IRI registry service
//!
//! JSON HTTP API over the registry: account tokens, IRI registration, admin
//! review, and vocabulary metadata (form and CSV import).

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use vocab_common::config::SiteConfig;
use vocab_common::events::EventBus;

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;
pub mod services;
pub mod tasks;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved site settings
    pub config: Arc<SiteConfig>,
    /// Side effects produced by handlers are dispatched here after commit
    pub event_bus: EventBus,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, config: SiteConfig, event_bus: EventBus) -> Self {
        Self {
            db,
            config: Arc::new(config),
            event_bus,
        }
    }
}

/// Build application router
///
/// Public: health, registration, token issue, search, CSV template.
/// Authenticated: everything else; `/api/admin/*` also requires the
/// administrator capability.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let admin = Router::new()
        .route("/api/admin/iris", get(api::list_pending))
        .route("/api/admin/iris/review", post(api::review_iri))
        .route_layer(middleware::from_fn(api::require_admin));

    let authenticated = Router::new()
        .route("/api/users/me", get(api::me))
        .route("/api/iris", post(api::create_iris))
        .route("/api/iris/mine", get(api::list_my_iris))
        .route("/api/vocabularies", post(api::create_vocabulary))
        .route(
            "/api/uploads/vocabulary",
            post(api::upload_vocabulary)
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .route("/api/vocabulary-paths/*vocabulary_path", get(api::get_vocabulary_path))
        .route("/api/vocabularies/:id/term-types", post(api::add_term_type))
        .route("/api/term-types/:id/terms", post(api::add_term))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_user,
        ));

    let public = Router::new()
        .route("/api/users", post(api::register))
        .route("/api/auth/token", post(api::issue_token))
        .route("/api/iris/search", get(api::search_iris))
        .route("/vocabtemplate.csv", get(api::download_template))
        .merge(api::health_routes());

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
