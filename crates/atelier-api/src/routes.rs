use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};

use crate::auth::{self, AppState};
use crate::backgrounds;
use crate::middleware::require_auth;
use crate::models;

/// JSON API routes. The server binary mounts the HTML entry page and the
/// static/upload file trees around this.
pub fn api_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/token", post(auth::login))
        .route("/users/", post(auth::register))
        .route("/health", get(health))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/users/me/", get(auth::me))
        .route("/models/", get(models::list_models))
        .route("/upload/", post(models::upload_model))
        .route("/upload-background/", post(backgrounds::upload_background))
        .route("/backgrounds/", get(backgrounds::list_backgrounds))
        .route(
            "/backgrounds/{background_id}",
            delete(backgrounds::delete_background),
        )
        .layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public).merge(protected)
}

async fn health() -> &'static str {
    "ok"
}
