//! receipt-pipeline server binary.
//!
//! Wires default agents against OpenRouter and serves the HTTP API.
//!
//! Environment:
//! - `OPENROUTER_API_KEY` (required)
//! - `PORT` (default 8080)
//! - `SPECIALIZED_VENDORS` - comma-separated vendor tags to register
//!   specialized parsers for (default "walmart,costco,target")
//! - `PIPELINE_MODE`, `QUALITY_THRESHOLD`, `COST_BUDGET`,
//!   `AGENT_TIMEOUT_SECS` - see `OrchestratorConfig::from_env`

use std::sync::Arc;

use receipt_pipeline::agent::vision::{ModelSpec, ReceiptParsingAgent, VendorDetectionAgent};
use receipt_pipeline::agent::{AgentRegistry, VendorTag};
use receipt_pipeline::api::{serve, AppState};
use receipt_pipeline::config::{ConfigStore, OrchestratorConfig};
use receipt_pipeline::llm::{OpenRouterClient, SharedLlmClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "receipt_pipeline=info,tower_http=info".into()),
        )
        .init();

    let api_key = std::env::var("OPENROUTER_API_KEY")
        .map_err(|_| anyhow::anyhow!("OPENROUTER_API_KEY is required"))?;
    let llm: SharedLlmClient = Arc::new(OpenRouterClient::new(api_key));

    let config = Arc::new(ConfigStore::new(OrchestratorConfig::from_env()));
    let registry = Arc::new(AgentRegistry::new());
    register_default_agents(&registry, &llm).await;

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let addr = format!("0.0.0.0:{}", port);

    let state = Arc::new(AppState::new(config, registry));
    serve(&addr, state).await
}

/// Register the default agent set: detector, one specialized parser per
/// configured vendor, the generic enhanced parser, and the baseline OCR
/// last resort.
async fn register_default_agents(registry: &Arc<AgentRegistry>, llm: &SharedLlmClient) {
    let vendors: Vec<VendorTag> = std::env::var("SPECIALIZED_VENDORS")
        .unwrap_or_else(|_| "walmart,costco,target".to_string())
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(VendorTag::new)
        .collect();

    let detector_spec = ModelSpec {
        model: "openai/gpt-4o-mini".to_string(),
        prompt_price_per_1k: 0.00015,
        completion_price_per_1k: 0.0006,
        estimated_cost: 0.002,
        estimated_latency_ms: 1500,
    };
    registry
        .register_detector(Arc::new(VendorDetectionAgent::new(
            Arc::clone(llm),
            detector_spec,
            vendors.clone(),
        )))
        .await;

    let specialized_spec = ModelSpec {
        model: "openai/gpt-4o".to_string(),
        prompt_price_per_1k: 0.0025,
        completion_price_per_1k: 0.01,
        estimated_cost: 0.02,
        estimated_latency_ms: 4000,
    };
    for vendor in &vendors {
        registry
            .register(
                vendor.clone(),
                Arc::new(ReceiptParsingAgent::specialized(
                    Arc::clone(llm),
                    specialized_spec.clone(),
                    vendor,
                )),
            )
            .await;
    }

    let generic_spec = ModelSpec {
        model: "openai/gpt-4o".to_string(),
        prompt_price_per_1k: 0.0025,
        completion_price_per_1k: 0.01,
        estimated_cost: 0.015,
        estimated_latency_ms: 4000,
    };
    let generic = Arc::new(ReceiptParsingAgent::generic_enhanced(
        Arc::clone(llm),
        generic_spec,
    ));
    registry
        .register(VendorTag::generic(), Arc::clone(&generic) as _)
        .await;
    registry.register_fallback(generic).await;

    let baseline_spec = ModelSpec {
        model: "qwen/qwen-2.5-vl-7b-instruct".to_string(),
        prompt_price_per_1k: 0.0002,
        completion_price_per_1k: 0.0002,
        estimated_cost: 0.001,
        estimated_latency_ms: 2500,
    };
    registry
        .register_baseline(Arc::new(ReceiptParsingAgent::baseline_ocr(
            Arc::clone(llm),
            baseline_spec,
        )))
        .await;
}
