//! Administrator review endpoints

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use vocab_common::db::RegisteredIri;
use vocab_common::{IriComponents, TermType};

use crate::api::iris::IrisResponse;
use crate::api::CurrentUser;
use crate::db::iris;
use crate::error::{ApiError, ApiResult};
use crate::services::review::{self, Decision};
use crate::AppState;

/// Identifies the pending record by its component tuple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub vocabulary_path: String,
    #[serde(default)]
    pub term_type: String,
    #[serde(default)]
    pub term: String,
    pub action: Decision,
}

/// GET /api/admin/iris
pub async fn list_pending(State(state): State<AppState>) -> ApiResult<Json<IrisResponse>> {
    let iris = iris::list_pending(&state.db).await?;
    Ok(Json(IrisResponse { iris }))
}

/// POST /api/admin/iris/review
pub async fn review_iri(
    State(state): State<AppState>,
    Extension(CurrentUser(reviewer)): Extension<CurrentUser>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<Json<RegisteredIri>> {
    let term_type =
        TermType::parse_choice(request.term_type.trim()).map_err(|e| ApiError::rejected(e, &request))?;
    let components = IriComponents::new(
        request.vocabulary_path.trim(),
        term_type,
        Some(request.term.trim().to_string()),
    );

    let outcome = review::review(
        &state.db,
        &state.config.redirect,
        &reviewer,
        &components,
        request.action,
    )
    .await?;

    // Dispatched only after the decision has committed
    state.event_bus.dispatch_all(outcome.events);

    Ok(Json(outcome.iri))
}
