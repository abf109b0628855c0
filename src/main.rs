use axum::{routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tossup::host::{GameHost, HostConfig};
use tossup::puzzles::PuzzleStore;
use tossup::registry::RoomRegistry;
use tossup::types::GameConfig;
use tossup::ws;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tossup=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tossup...");

    // Initialize the AI game host (static fallback when unconfigured)
    let host = Arc::new(GameHost::new(HostConfig::from_env()));

    // Load the puzzle catalog
    let puzzles_path =
        std::env::var("PUZZLES_PATH").unwrap_or_else(|_| "puzzles.json".to_string());
    let puzzles = Arc::new(PuzzleStore::load(&puzzles_path));

    let registry = Arc::new(RoomRegistry::new(host, puzzles, GameConfig::default()));

    let app = Router::new()
        .route("/ws/{room_id}", get(ws::ws_handler))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(registry);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8000));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Health check endpoint.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "tossup",
    }))
}
