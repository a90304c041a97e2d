use std::collections::HashMap;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Multipart, State},
};
use tracing::warn;
use uuid::Uuid;

use atelier_types::api::{
    AnimationResponse, ModelResponse, UploadResponse, UploadedAnimation, UploadedModel,
};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::storage;

pub async fn list_models(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<ModelResponse>>> {
    Ok(Json(load_user_models(&state, &user.id).await?))
}

/// Fetch a user's models with their animations nested, mapped to wire
/// DTOs. Shared by the models listing and /users/me/.
pub(crate) async fn load_user_models(
    state: &AppState,
    user_id: &str,
) -> ApiResult<Vec<ModelResponse>> {
    let db = state.clone();
    let uid = user_id.to_string();
    let (models, animations) = tokio::task::spawn_blocking(move || {
        let models = db.db.list_models_for_user(&uid)?;
        let model_ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
        let animations = db.db.list_animations_for_models(&model_ids)?;
        anyhow::Ok((models, animations))
    })
    .await
    .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??;

    let mut by_model: HashMap<String, Vec<AnimationResponse>> = HashMap::new();
    for anim in animations {
        let Some(model_id) = anim.model_id.clone() else {
            continue;
        };
        by_model.entry(model_id).or_default().push(AnimationResponse {
            id: parse_id(&anim.id, "animation"),
            anim_name: anim.anim_name,
            vrma_path: anim.vrma_path,
        });
    }

    Ok(models
        .into_iter()
        .map(|row| ModelResponse {
            id: parse_id(&row.id, "model"),
            animations: by_model.remove(&row.id).unwrap_or_default(),
            name: row.name,
            vrm_path: row.vrm_path,
        })
        .collect())
}

/// POST /upload/ — multipart form with a display name, one model file
/// and zero or more animation files. Creates one model row plus one
/// animation row per non-empty animation part.
///
/// A file that reaches disk before a failed insert stays there; there is
/// no compensating delete (see DESIGN.md).
pub async fn upload_model(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut name: Option<String> = None;
    let mut vrm_file: Option<(String, Bytes)> = None;
    let mut vrma_files: Vec<(String, Bytes)> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => {
                name = Some(field.text().await.map_err(bad_multipart)?);
            }
            "vrm_file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                vrm_file = Some((filename, bytes));
            }
            "vrma_files" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                // browsers send one empty part when no file was selected
                if !filename.is_empty() {
                    vrma_files.push((filename, bytes));
                }
            }
            _ => {}
        }
    }

    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing form field: name".to_string()))?;
    let (vrm_filename, vrm_bytes) = vrm_file
        .ok_or_else(|| ApiError::BadRequest("Missing form field: vrm_file".to_string()))?;

    let stored = state
        .storage
        .store(&user.id, None, &vrm_filename, &vrm_bytes)
        .await
        .map_err(|e| ApiError::Internal(e.context("Failed to upload model")))?;

    let db = state.clone();
    let model_id = Uuid::new_v4().to_string();
    let model_row = {
        let (id, model_name, path, uid) = (
            model_id,
            name,
            stored.url_path,
            user.id.clone(),
        );
        tokio::task::spawn_blocking(move || db.db.insert_model(&id, &model_name, &path, &uid))
            .await
            .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))?
            .map_err(|e| ApiError::Internal(e.context("Failed to upload model")))?
    };

    let mut animations = Vec::with_capacity(vrma_files.len());
    for (filename, bytes) in vrma_files {
        // Animation display name is the filename with its extension stripped
        let anim_name = storage::stem_of(&filename).unwrap_or(&filename).to_string();

        let stored = state
            .storage
            .store(&user.id, Some("animations"), &filename, &bytes)
            .await
            .map_err(|e| ApiError::Internal(e.context("Failed to upload model")))?;

        let db = state.clone();
        let row = {
            let (id, anim_name, path, uid, mid) = (
                Uuid::new_v4().to_string(),
                anim_name,
                stored.url_path,
                user.id.clone(),
                model_row.id.clone(),
            );
            tokio::task::spawn_blocking(move || {
                db.db.insert_animation(&id, &anim_name, &path, &uid, &mid)
            })
            .await
            .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))?
            .map_err(|e| ApiError::Internal(e.context("Failed to upload model")))?
        };

        animations.push(UploadedAnimation {
            id: parse_id(&row.id, "animation"),
            name: row.anim_name,
            path: row.vrma_path,
        });
    }

    Ok(Json(UploadResponse {
        model: UploadedModel {
            id: parse_id(&model_row.id, "model"),
            name: model_row.name,
            vrm_path: model_row.vrm_path,
        },
        animations,
    }))
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Malformed multipart body: {}", err))
}

/// Stored ids are UUID text; a row that fails to parse is corrupt data,
/// not a request error.
pub(crate) fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", what, raw, e);
        Uuid::default()
    })
}
