//! Account endpoints

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use vocab_common::db::User;

use crate::api::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::services::accounts::{self, NewAccount, Profile};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// A plaintext token is only ever returned here
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub user: User,
    pub token: String,
}

/// POST /api/users
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let account = NewAccount {
        username: &request.username,
        email: &request.email,
        password: &request.password,
        password_confirmation: &request.password_confirmation,
    };

    let issued = accounts::register(&state.db, account).await.map_err(|e| {
        // Passwords are never echoed
        ApiError::rejected(e, &json!({"username": request.username, "email": request.email}))
    })?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            user: issued.user,
            token: issued.token,
        }),
    ))
}

/// POST /api/auth/token
pub async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let issued = accounts::issue_token(&state.db, &request.username, &request.password).await?;

    Ok(Json(TokenResponse {
        user: issued.user,
        token: issued.token,
    }))
}

/// GET /api/users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(accounts::profile(&state.db, user).await?))
}
