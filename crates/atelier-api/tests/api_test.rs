use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use atelier_api::auth::{AppState, AppStateInner};
use atelier_api::routes::api_router;
use atelier_api::storage::Storage;
use atelier_api::token::TokenKeys;
use atelier_db::Database;

const TEST_SECRET: &str = "integration-test-secret";
const BOUNDARY: &str = "------------------------atelier-test";

async fn test_app() -> (Router, AppState, PathBuf) {
    let uploads_root = std::env::temp_dir().join(format!("atelier-api-test-{}", Uuid::new_v4()));
    let storage = Storage::new(uploads_root.clone()).await.unwrap();

    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        storage,
        tokens: TokenKeys::new(TEST_SECRET),
        token_ttl: chrono::Duration::hours(24),
    });

    (api_router(state.clone()), state, uploads_root)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(app: &Router, email: &str, password: &str) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri("/users/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": email, "password": password }).to_string(),
        ))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn login(app: &Router, email: &str, password: &str) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={}&password={}", email, password)))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Register + login, returning (user_id, bearer token).
async fn signup(app: &Router, email: &str, password: &str) -> (String, String) {
    let response = register(app, email, password).await;
    assert_eq!(response.status(), StatusCode::OK);
    let user = body_json(response).await;
    let user_id = user["id"].as_str().unwrap().to_string();

    let response = login(app, email, password).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["token_type"], "bearer");
    let token = body["access_token"].as_str().unwrap().to_string();

    (user_id, token)
}

async fn get_authed(app: &Router, uri: &str, token: &str) -> axum::response::Response {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// A multipart part: (field name, optional filename, content).
fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn post_multipart(
    app: &Router,
    uri: &str,
    token: &str,
    parts: &[(&str, Option<&str>, &[u8])],
) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Map a stored `/uploads/...` URL path back to its on-disk location.
fn disk_path(uploads_root: &PathBuf, url_path: &str) -> PathBuf {
    uploads_root.join(url_path.strip_prefix("/uploads/").unwrap())
}

#[tokio::test]
async fn test_register_login_me_roundtrip() {
    let (app, _state, _root) = test_app().await;

    let response = register(&app, "me@example.com", "hunter2hunter2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let user = body_json(response).await;
    assert_eq!(user["email"], "me@example.com");
    assert_eq!(user["is_active"], true);
    assert_eq!(user["vrm_models"], json!([]));
    assert!(user.get("password").is_none());

    let response = login(&app, "me@example.com", "hunter2hunter2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = get_authed(&app, "/users/me/", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["email"], "me@example.com");
    assert_eq!(me["id"], user["id"]);
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let (app, _state, _root) = test_app().await;

    let response = register(&app, "dup@example.com", "first-password").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Same email, different password: still rejected
    let response = register(&app, "dup@example.com", "other-password").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Email already registered");

    // The original credentials keep working
    let response = login(&app, "dup@example.com", "first-password").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_are_401_with_challenge() {
    let (app, _state, _root) = test_app().await;
    register(&app, "known@example.com", "right-password").await;

    for (email, password) in [
        ("known@example.com", "wrong-password"),
        ("unknown@example.com", "whatever"),
    ] {
        let response = login(&app, email, password).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
        assert_eq!(
            body_json(response).await["detail"],
            "Incorrect username or password"
        );
    }
}

#[tokio::test]
async fn test_protected_routes_require_a_valid_token() {
    let (app, state, _root) = test_app().await;

    // No Authorization header
    let request = Request::builder()
        .uri("/users/me/")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );

    // Non-bearer scheme
    let request = Request::builder()
        .uri("/models/")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Garbage token
    let response = get_authed(&app, "/backgrounds/", "not.a.jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Well-formed token whose subject was never registered
    let ghost = state
        .tokens
        .issue("ghost@example.com", chrono::Duration::hours(1))
        .unwrap();
    let response = get_authed(&app, "/users/me/", &ghost).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_for_deleted_user_is_rejected() {
    let (app, state, _root) = test_app().await;
    let (user_id, token) = signup(&app, "gone@example.com", "password").await;

    assert!(state.db.delete_user(&user_id).unwrap());

    let response = get_authed(&app, "/users/me/", &token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_model_with_animations() {
    let (app, _state, uploads_root) = test_app().await;
    let (user_id, token) = signup(&app, "uploader@example.com", "password").await;

    let response = post_multipart(
        &app,
        "/upload/",
        &token,
        &[
            ("name", None, b"My Avatar"),
            ("vrm_file", Some("avatar.vrm"), b"vrm-binary-data"),
            ("vrma_files", Some("walk.vrma"), b"walk-data"),
            ("vrma_files", Some("my.dance.vrma"), b"dance-data"),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["model"]["name"], "My Avatar");
    let vrm_path = body["model"]["vrm_path"].as_str().unwrap();
    assert!(vrm_path.starts_with(&format!("/uploads/{}/", user_id)));
    assert!(vrm_path.ends_with(".vrm"));
    assert_eq!(
        std::fs::read(disk_path(&uploads_root, vrm_path)).unwrap(),
        b"vrm-binary-data"
    );

    // One animation row per uploaded file, named by filename stem
    let animations = body["animations"].as_array().unwrap();
    assert_eq!(animations.len(), 2);
    let mut names: Vec<&str> = animations
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, ["my.dance", "walk"]);
    for animation in animations {
        let path = animation["path"].as_str().unwrap();
        assert!(path.starts_with(&format!("/uploads/{}/animations/", user_id)));
        assert!(disk_path(&uploads_root, path).exists());
    }

    // The listing nests the same animations under the model
    let response = get_authed(&app, "/models/", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let models = body_json(response).await;
    let models = models.as_array().unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["name"], "My Avatar");
    assert_eq!(models[0]["animations"].as_array().unwrap().len(), 2);

    // /users/me/ carries the nested models as well
    let response = get_authed(&app, "/users/me/", &token).await;
    let me = body_json(response).await;
    assert_eq!(me["vrm_models"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_without_model_file_is_rejected() {
    let (app, _state, uploads_root) = test_app().await;
    let (user_id, token) = signup(&app, "partial@example.com", "password").await;

    let response = post_multipart(&app, "/upload/", &token, &[("name", None, b"No file")]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing reached the asset store
    assert!(!uploads_root.join(&user_id).exists());
}

#[tokio::test]
async fn test_model_listing_is_isolated_per_user() {
    let (app, _state, _root) = test_app().await;
    let (_a_id, a_token) = signup(&app, "a@example.com", "password-a").await;
    let (_b_id, b_token) = signup(&app, "b@example.com", "password-b").await;

    for (token, name) in [(&a_token, "a-model"), (&b_token, "b-model")] {
        let response = post_multipart(
            &app,
            "/upload/",
            token,
            &[
                ("name", None, name.as_bytes()),
                ("vrm_file", Some("avatar.vrm"), b"data"),
            ],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let models = body_json(get_authed(&app, "/models/", &a_token).await).await;
    let models = models.as_array().unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["name"], "a-model");

    let models = body_json(get_authed(&app, "/models/", &b_token).await).await;
    let models = models.as_array().unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["name"], "b-model");
}

#[tokio::test]
async fn test_background_upload_rejects_non_images_before_writing() {
    let (app, _state, uploads_root) = test_app().await;
    let (user_id, token) = signup(&app, "bg@example.com", "password").await;

    for filename in ["notes.txt", "model.vrm", "no_extension"] {
        let response = post_multipart(
            &app,
            "/upload-background/",
            &token,
            &[("background_file", Some(filename), b"payload")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // The extension gate ran before any filesystem write
    assert!(!uploads_root.join(&user_id).exists());
}

#[tokio::test]
async fn test_background_lifecycle() {
    let (app, _state, uploads_root) = test_app().await;
    let (user_id, token) = signup(&app, "life@example.com", "password").await;

    let response = post_multipart(
        &app,
        "/upload-background/",
        &token,
        &[("background_file", Some("sky.PNG"), b"png-bytes")],
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let background = body_json(response).await;
    assert_eq!(background["filename"], "sky.PNG");
    let path = background["path"].as_str().unwrap().to_string();
    assert!(path.starts_with(&format!("/uploads/{}/backgrounds/", user_id)));
    assert!(disk_path(&uploads_root, &path).exists());

    let listed = body_json(get_authed(&app, "/backgrounds/", &token).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Delete removes both the row and the file
    let id = background["id"].as_str().unwrap();
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/backgrounds/{}", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!disk_path(&uploads_root, &path).exists());

    let listed = body_json(get_authed(&app, "/backgrounds/", &token).await).await;
    assert!(listed.as_array().unwrap().is_empty());

    // Repeating the delete is a 404, not an error
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/backgrounds/{}", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_background_delete_is_owner_scoped() {
    let (app, _state, _root) = test_app().await;
    let (_owner_id, owner_token) = signup(&app, "owner@example.com", "password").await;
    let (_other_id, other_token) = signup(&app, "other@example.com", "password").await;

    let response = post_multipart(
        &app,
        "/upload-background/",
        &owner_token,
        &[("background_file", Some("mine.jpg"), b"jpeg")],
    )
    .await;
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    // Another user's delete attempt sees a 404, and the row survives
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/backgrounds/{}", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", other_token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let listed = body_json(get_authed(&app, "/backgrounds/", &owner_token).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _state, _root) = test_app().await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
