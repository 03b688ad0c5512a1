//! IRI registration, listing and search endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use vocab_common::db::RegisteredIri;
use vocab_common::{IriComponents, TermType};

use crate::api::CurrentUser;
use crate::db::iris;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, PAGE_SIZE};
use crate::services::registry::{self, IriSource};
use crate::AppState;

/// One form of a submission: either an address or its components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IriForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_iri: Option<String>,
    #[serde(default)]
    pub vocabulary_path: String,
    /// Empty for none
    #[serde(default)]
    pub term_type: String,
    #[serde(default)]
    pub term: String,
}

impl IriForm {
    fn into_source(self) -> vocab_common::Result<IriSource> {
        match self.full_iri.filter(|a| !a.trim().is_empty()) {
            Some(address) => Ok(IriSource::Address(address.trim().to_string())),
            None => Ok(IriSource::Components(IriComponents::new(
                self.vocabulary_path.trim(),
                TermType::parse_choice(self.term_type.trim())?,
                Some(self.term.trim().to_string()),
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIrisRequest {
    pub iris: Vec<IriForm>,
}

#[derive(Debug, Serialize)]
pub struct IrisResponse {
    pub iris: Vec<RegisteredIri>,
}

/// POST /api/iris
///
/// The whole form set is created atomically; one admin notification per IRI.
pub async fn create_iris(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(request): Json<CreateIrisRequest>,
) -> ApiResult<(StatusCode, Json<IrisResponse>)> {
    let sources = request
        .iris
        .iter()
        .cloned()
        .map(IriForm::into_source)
        .collect::<vocab_common::Result<Vec<_>>>()
        .map_err(|e| ApiError::rejected(e, &request))?;

    let registration = registry::create_batch(&state.db, &state.config.iri_domain, sources, user.guid)
        .await
        .map_err(|e| ApiError::rejected(e, &request))?;

    state.event_bus.dispatch_all(registration.events);

    Ok((
        StatusCode::CREATED,
        Json(IrisResponse {
            iris: registration.iris,
        }),
    ))
}

/// GET /api/iris/mine
pub async fn list_my_iris(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<IrisResponse>> {
    let iris = iris::list_by_owner(&state.db, user.guid).await?;
    Ok(Json(IrisResponse { iris }))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,

    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub results: Vec<RegisteredIri>,
}

/// GET /api/iris/search?q=..&page=..
///
/// Public search over accepted registrations.
pub async fn search_iris(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let q = query.q.trim().to_string();
    let total_results = iris::count_accepted_matching(&state.db, &q).await?;
    let pagination = calculate_pagination(total_results, query.page);
    let results = iris::search_accepted(&state.db, &q, PAGE_SIZE, pagination.offset).await?;

    info!(query = %q, total_results, page = pagination.page, "IRI search");

    Ok(Json(SearchResponse {
        query: q,
        total_results,
        page: pagination.page,
        page_size: PAGE_SIZE,
        total_pages: pagination.total_pages,
        results,
    }))
}
