use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::auth::AppState;
use crate::error::ApiError;

/// Authenticated identity resolved by `require_auth`, injected into
/// request extensions for downstream handlers. This is the only
/// authorization mechanism: handlers scope every query by `id`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub is_active: bool,
}

/// Extract and validate the bearer token from the Authorization header,
/// then resolve its subject to a persisted user. A valid token whose
/// subject no longer exists (deleted user) fails exactly like a bad one.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(ApiError::invalid_credentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(ApiError::invalid_credentials)?;

    let claims = state
        .tokens
        .validate(token)
        .ok_or_else(ApiError::invalid_credentials)?;

    let db = state.clone();
    let email = claims.sub;
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_email(&email))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??
        .ok_or_else(ApiError::invalid_credentials)?;

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        is_active: user.is_active,
    });
    Ok(next.run(req).await)
}
