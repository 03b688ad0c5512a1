//! Bearer-token authentication and the administrator gate
//!
//! `require_user` resolves `Authorization: Bearer <token>` to an account and
//! stores it in the request extensions as [`CurrentUser`]. `require_admin`
//! must be layered inside `require_user`.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use vocab_common::db::User;
use vocab_common::Error;

use crate::error::ApiError;
use crate::services::accounts;
use crate::AppState;

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("Authentication required".to_string()))?
        .to_str()
        .map_err(|_| Error::Unauthorized("Malformed Authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Unauthorized("Expected a Bearer token".to_string()))?;

    Ok(token.to_string())
}

/// Authentication middleware; 401 when the token is missing or unknown
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())?;
    let user = accounts::authenticate_token(&state.db, &token)
        .await
        .map_err(|e| {
            warn!(path = %request.uri().path(), "Rejected request with invalid token");
            e
        })?;

    debug!(username = %user.username, "Authenticated request");
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Administrator gate; 403 for authenticated non-administrators
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| Error::Unauthorized("Authentication required".to_string()))?;

    if !user.0.is_admin {
        warn!(username = %user.0.username, "Non-administrator refused");
        return Err(Error::PermissionDenied("Administrator capability required".to_string()).into());
    }

    Ok(next.run(request).await)
}
