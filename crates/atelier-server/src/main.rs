mod bootstrap;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, response::Html, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use atelier_api::auth::AppStateInner;
use atelier_api::routes::api_router;
use atelier_api::storage::Storage;
use atelier_api::token::{DEFAULT_TTL_HOURS, TokenKeys};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier=debug,tower_http=debug".into()),
        )
        .init();

    // Config — the signing secret is never compiled in
    let jwt_secret = std::env::var("ATELIER_JWT_SECRET").unwrap_or_default();
    if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
        eprintln!("FATAL: ATELIER_JWT_SECRET is unset or still a placeholder.");
        eprintln!("       Set it in your .env file and restart.");
        std::process::exit(1);
    }

    let db_path = std::env::var("ATELIER_DB_PATH").unwrap_or_else(|_| "atelier.db".into());
    let host = std::env::var("ATELIER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ATELIER_PORT")
        .unwrap_or_else(|_| "8000".into())
        .parse()?;
    let uploads_dir: PathBuf = std::env::var("ATELIER_UPLOADS_DIR")
        .unwrap_or_else(|_| "./uploads".into())
        .into();
    let static_dir: PathBuf = std::env::var("ATELIER_STATIC_DIR")
        .unwrap_or_else(|_| "./static".into())
        .into();
    let token_ttl_hours: i64 = std::env::var("ATELIER_TOKEN_TTL_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_TTL_HOURS);

    // Init database and storage
    let db = atelier_db::Database::open(&PathBuf::from(&db_path))?;
    let storage = Storage::new(uploads_dir.clone()).await?;
    bootstrap::prepare(&static_dir).await?;

    // Shared state
    let state = Arc::new(AppStateInner {
        db,
        storage,
        tokens: TokenKeys::new(&jwt_secret),
        token_ttl: chrono::Duration::hours(token_ttl_hours),
    });

    let app = Router::new()
        .route("/", get(index))
        .merge(api_router(state))
        .nest_service("/static", ServeDir::new(&static_dir))
        .nest_service("/uploads", ServeDir::new(&uploads_dir))
        .layer(DefaultBodyLimit::max(4 * 1024 * 1024 * 1024)) // 4 GB max
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Atelier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../templates/index.html"))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
