//! Extraction endpoints.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json};
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::agent::ImageInput;
use crate::pipeline::{AgenticResult, ExtractionOptions, ExtractionRequest, PipelineError};

use super::routes::AppState;

/// Request body for POST /api/extract.
///
/// Exactly one of `image_url` / `image_base64` must be supplied.
#[derive(Debug, Deserialize)]
pub struct ExtractBody {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
    /// MIME type for `image_base64` payloads. Defaults to image/jpeg.
    #[serde(default)]
    pub mime: Option<String>,
    #[serde(default)]
    pub options: ExtractionOptions,
}

impl ExtractBody {
    fn into_request(self) -> Result<ExtractionRequest, String> {
        let image = match (self.image_url, self.image_base64) {
            (Some(url), None) => ImageInput::url(url),
            (None, Some(encoded)) => {
                let data = base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| format!("invalid base64 image data: {}", e))?;
                ImageInput::bytes(data, self.mime.unwrap_or_else(|| "image/jpeg".to_string()))
            }
            (Some(_), Some(_)) => {
                return Err("supply either image_url or image_base64, not both".to_string())
            }
            (None, None) => return Err("no image supplied".to_string()),
        };
        Ok(ExtractionRequest::with_options(image, self.options))
    }
}

/// POST /api/extract
/// Run the full extraction pipeline for one receipt image.
pub async fn extract(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExtractBody>,
) -> Result<Json<AgenticResult>, (StatusCode, Json<serde_json::Value>)> {
    let request = body
        .into_request()
        .map_err(|message| bad_request(&PipelineError::InputInvalid { message }))?;

    match state.orchestrator.process_receipt(request).await {
        Ok(result) => Ok(Json(result)),
        Err(err @ PipelineError::InputInvalid { .. }) => Err(bad_request(&err)),
        // Everything else is carried inside the envelope; reaching here
        // would be a contract violation, so report it as such.
        Err(err) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )),
    }
}

/// GET /api/extract/estimate
/// Cost projection from declared agent estimates; no agent is invoked.
pub async fn estimate(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let estimated_cost = state.orchestrator.estimate_cost().await;
    Json(json!({ "estimated_cost": estimated_cost }))
}

fn bad_request(err: &PipelineError) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::to_value(err).map(|e| json!({ "error": e })).unwrap_or_default()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_body_builds_request() {
        let body = ExtractBody {
            image_url: Some("https://example.com/r.jpg".to_string()),
            image_base64: None,
            mime: None,
            options: ExtractionOptions::default(),
        };
        let request = body.into_request().unwrap();
        assert!(!request.image.is_empty());
    }

    #[test]
    fn both_image_fields_rejected() {
        let body = ExtractBody {
            image_url: Some("https://example.com/r.jpg".to_string()),
            image_base64: Some("AAAA".to_string()),
            mime: None,
            options: ExtractionOptions::default(),
        };
        assert!(body.into_request().is_err());
    }

    #[test]
    fn invalid_base64_rejected() {
        let body = ExtractBody {
            image_url: None,
            image_base64: Some("not-base64!!!".to_string()),
            mime: None,
            options: ExtractionOptions::default(),
        };
        assert!(body.into_request().is_err());
    }
}
