use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use tracing::warn;
use uuid::Uuid;

use atelier_types::api::BackgroundResponse;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::CurrentUser;
use crate::models::parse_id;
use crate::storage;

/// POST /upload-background/ — multipart form with a single image file.
/// The extension allow-list is checked before any byte reaches disk.
pub async fn upload_background(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<BackgroundResponse>> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let field_name = field.name().unwrap_or_default().to_string();
        if field_name == "background_file" {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            upload = Some((filename, bytes));
        }
    }

    let (filename, bytes) = upload.ok_or_else(|| {
        ApiError::BadRequest("Missing form field: background_file".to_string())
    })?;

    if !storage::is_allowed_image(&filename) {
        return Err(ApiError::UnsupportedMediaType(
            "Unsupported file format. Upload a JPG, PNG or GIF image.".to_string(),
        ));
    }

    let stored = state
        .storage
        .store(&user.id, Some("backgrounds"), &filename, &bytes)
        .await
        .map_err(|e| ApiError::Internal(e.context("Failed to upload background")))?;

    let db = state.clone();
    let row = {
        let (id, filename, path, uid) = (
            Uuid::new_v4().to_string(),
            filename,
            stored.url_path,
            user.id.clone(),
        );
        tokio::task::spawn_blocking(move || db.db.insert_background(&id, &filename, &path, &uid))
            .await
            .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))?
            .map_err(|e| ApiError::Internal(e.context("Failed to upload background")))?
    };

    Ok(Json(BackgroundResponse {
        id: parse_id(&row.id, "background"),
        filename: row.filename,
        path: row.path,
    }))
}

pub async fn list_backgrounds(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<BackgroundResponse>>> {
    let db = state.clone();
    let uid = user.id.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.list_backgrounds_for_user(&uid))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??;

    Ok(Json(
        rows.into_iter()
            .map(|row| BackgroundResponse {
                id: parse_id(&row.id, "background"),
                filename: row.filename,
                path: row.path,
            })
            .collect(),
    ))
}

/// DELETE /backgrounds/{id} — removes the row and its stored file.
/// File removal is tolerant: the row goes away even when the file is
/// already missing or the filesystem misbehaves.
pub async fn delete_background(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(background_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let db = state.clone();
    let id = background_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_background(&id))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??;

    let Some(row) = row else {
        return Err(not_found());
    };
    // Other users' backgrounds are invisible, not forbidden
    if row.user_id != user.id {
        return Err(not_found());
    }

    if let Err(e) = state.storage.delete(&row.path).await {
        warn!("Failed to delete background file {}: {:#}", row.path, e);
    }

    let db = state.clone();
    let id = row.id.clone();
    let removed = tokio::task::spawn_blocking(move || db.db.delete_background_row(&id))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??;

    if !removed {
        return Err(not_found());
    }
    Ok(StatusCode::OK)
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Malformed multipart body: {}", err))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Background not found".to_string())
}
