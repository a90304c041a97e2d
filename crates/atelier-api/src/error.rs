use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use atelier_types::api::ErrorBody;

pub type ApiResult<T> = Result<T, ApiError>;

/// Unified handler-boundary error. Every failure a handler can produce
/// maps onto one of these; `IntoResponse` turns it into a JSON body with
/// a `detail` message and the matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, invalid or expired credentials (401).
    #[error("{0}")]
    Unauthenticated(String),

    /// Malformed or incomplete request input (400).
    #[error("{0}")]
    BadRequest(String),

    /// Duplicate email on registration (400, source contract).
    #[error("{0}")]
    Conflict(String),

    /// Upload with an extension outside the image allow-list (400).
    #[error("{0}")]
    UnsupportedMediaType(String),

    /// Absent resource (404).
    #[error("{0}")]
    NotFound(String),

    /// Anything else: file or DB I/O failure (500).
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// The canonical 401 used by the auth middleware and token endpoint.
    pub fn invalid_credentials() -> Self {
        Self::Unauthenticated("Could not validate credentials".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::UnsupportedMediaType(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(err) => {
                error!("Internal error: {:#}", err);
                // The raw chain is diagnostic-only; release builds get a
                // generic message instead.
                let detail = if cfg!(debug_assertions) {
                    format!("{:#}", err)
                } else {
                    "Internal server error".to_string()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };

        let mut response = (status, Json(ErrorBody { detail })).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }

        response
    }
}
