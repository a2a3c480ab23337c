//! HTTP route handlers and server setup.

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::SharedAgentRegistry;
use crate::config::SharedConfigStore;
use crate::pipeline::Orchestrator;

use super::config as config_api;
use super::extract;

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub config: SharedConfigStore,
    pub registry: SharedAgentRegistry,
}

impl AppState {
    pub fn new(config: SharedConfigStore, registry: SharedAgentRegistry) -> Self {
        Self {
            orchestrator: Orchestrator::new(Arc::clone(&config), Arc::clone(&registry)),
            config,
            registry,
        }
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/extract", axum::routing::post(extract::extract))
        .route("/api/extract/estimate", get(extract::estimate))
        .route("/api/agents/status", get(agent_status))
        .nest("/api/config", config_api::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /api/agents/status
/// Read-only introspection: registered agents plus current config.
async fn agent_status(
    State(state): State<Arc<AppState>>,
) -> Json<crate::pipeline::AgentStatusReport> {
    Json(state.orchestrator.agent_status().await)
}
