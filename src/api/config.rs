//! API endpoints for orchestrator configuration.
//!
//! The PUT route is an administrative mutation; the caller is expected to
//! gate it behind its own authorization check.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::json;

use crate::config::{ConfigError, ConfigPatch, OrchestratorConfig};
use crate::pipeline::PipelineError;

use super::routes::AppState;

/// Create the configuration API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_config).put(update_config))
}

/// GET /api/config
/// Read-only snapshot of the current configuration.
async fn get_config(State(state): State<Arc<AppState>>) -> Json<OrchestratorConfig> {
    Json(state.config.current().await)
}

/// PUT /api/config
/// Merge the supplied fields over the current configuration and return
/// the new snapshot. A malformed patch changes nothing.
async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<ConfigPatch>,
) -> Result<Json<OrchestratorConfig>, (StatusCode, Json<serde_json::Value>)> {
    state
        .config
        .update(patch)
        .await
        .map(Json)
        .map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": configuration_invalid(e) })),
            )
        })
}

/// Surface a store rejection in the pipeline error taxonomy.
fn configuration_invalid(err: ConfigError) -> PipelineError {
    PipelineError::ConfigurationInvalid {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_rejection_maps_into_taxonomy() {
        let err = configuration_invalid(ConfigError::ThresholdOutOfRange(140.0));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "configuration_invalid");
        assert!(json["message"].as_str().unwrap().contains("140"));
    }
}
