use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims used by the auth middleware and the token endpoint.
/// Canonical definition lives here in atelier-types so the API crate and
/// any future services agree on the payload shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email address.
    pub sub: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// OAuth2 password-grant form body for POST /token. The `username` field
/// carries the email; extra OAuth2 fields (grant_type, scope, ...) are
/// accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub vrm_models: Vec<ModelResponse>,
}

// -- Models & animations --

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelResponse {
    pub id: Uuid,
    pub name: String,
    pub vrm_path: String,
    pub animations: Vec<AnimationResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnimationResponse {
    pub id: Uuid,
    pub anim_name: String,
    pub vrma_path: String,
}

/// Response body for POST /upload/. The nested shapes are intentionally
/// distinct from ModelResponse/AnimationResponse: the upload endpoint
/// reports animations under `name`/`path` keys.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub model: UploadedModel,
    pub animations: Vec<UploadedAnimation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadedModel {
    pub id: Uuid,
    pub name: String,
    pub vrm_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadedAnimation {
    pub id: Uuid,
    pub name: String,
    pub path: String,
}

// -- Backgrounds --

#[derive(Debug, Serialize, Deserialize)]
pub struct BackgroundResponse {
    pub id: Uuid,
    pub filename: String,
    pub path: String,
}

// -- Errors --

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
