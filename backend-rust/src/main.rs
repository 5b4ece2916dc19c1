mod handlers;
mod persistence;
mod sample_hub;
mod state;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use vario_core::VarioConfig;

use handlers::ws_handler;
use persistence::SettingsStore;
use sample_hub::{start_sample_hub, HubConfig};
use state::{now_ms, AppState, SharedState};

// ─── Time Sync Endpoint ───────────────────────────────────────────────────────

async fn time_sync() -> axum::Json<serde_json::Value> {
    axum::Json(json!({ "serverTime": now_ms() }))
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vario_backend=info,vario_core=info".into()),
        )
        .init();

    info!("🪂 AeroVario backend starting...");

    let config = match std::env::var("VARIO_CONFIG") {
        Ok(path) => {
            info!("Loading pipeline config from {path}");
            VarioConfig::load(&path).with_context(|| format!("loading {path}"))?
        }
        Err(_) => VarioConfig::default(),
    };

    // Load persisted settings + logbook
    let data_dir = std::env::var("VARIO_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let store = SettingsStore::new(data_dir);
    info!("Data directory: {}", store.dir().display());
    let shared: SharedState = Arc::new(AppState::load(config, store).await);

    // UDP sample hub for devices and the simulator
    tokio::spawn(start_sample_hub(HubConfig::default(), shared.clone()));

    // CORS: allow all origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/sync", get(time_sync))
        .route("/health", get(|| async { "vario-backend ok" }))
        .with_state(shared)
        .layer(cors);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");
    info!("🚀 Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
