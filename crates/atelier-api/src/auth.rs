use std::sync::Arc;

use axum::{Extension, Form, Json, extract::State};
use chrono::Duration;
use uuid::Uuid;

use atelier_db::Database;
use atelier_types::api::{LoginForm, RegisterRequest, TokenResponse, UserResponse};

use crate::credentials;
use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::models;
use crate::storage::Storage;
use crate::token::TokenKeys;

pub type AppState = Arc<AppStateInner>;

/// Application context built once at startup and passed to every handler.
pub struct AppStateInner {
    pub db: Database,
    pub storage: Storage,
    pub tokens: TokenKeys,
    pub token_ttl: Duration,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<UserResponse>> {
    // Validate input
    if req.email.is_empty() || !req.email.contains('@') {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("Password must not be empty".to_string()));
    }

    // Duplicate check is exact-match; the UNIQUE constraint backs it up
    let db = state.clone();
    let email = req.email.clone();
    let existing = tokio::task::spawn_blocking(move || db.db.get_user_by_email(&email))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let password_hash = credentials::hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let db = state.clone();
    let id = user_id.to_string();
    let email = req.email.clone();
    tokio::task::spawn_blocking(move || db.db.create_user(&id, &email, &password_hash))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??;

    Ok(Json(UserResponse {
        id: user_id,
        email: req.email,
        is_active: true,
        vrm_models: vec![],
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    let db = state.clone();
    let email = form.username.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_email(&email))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??;

    // Unknown email and wrong password are indistinguishable to the client
    let Some(user) = user else {
        return Err(invalid_login());
    };
    if !credentials::verify_password(&form.password, &user.password) {
        return Err(invalid_login());
    }

    let access_token = state.tokens.issue(&user.email, state.token_ttl)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<UserResponse>> {
    let vrm_models = models::load_user_models(&state, &user.id).await?;

    Ok(Json(UserResponse {
        id: models::parse_id(&user.id, "user"),
        email: user.email,
        is_active: user.is_active,
        vrm_models,
    }))
}

fn invalid_login() -> ApiError {
    ApiError::Unauthenticated("Incorrect username or password".to_string())
}
