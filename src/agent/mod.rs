//! Extraction agent types and capability interface.
//!
//! An agent is a single extraction strategy (vendor detector or parser)
//! with a declared cost/latency estimate. Agents are interchangeable
//! behind the [`ExtractionAgent`] trait and selected at runtime through
//! the [`registry::AgentRegistry`].

pub mod registry;
pub mod vision;

pub use registry::{AgentRegistry, AgentStatus, SharedAgentRegistry};

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Vendor identifier. Open set: new tags are introduced by registering an
/// agent for them, never by touching the orchestrator core.
///
/// Tags are case-normalized so that `"Walmart"` and `"walmart"` compare
/// equal and hash to the same registry bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VendorTag(String);

impl VendorTag {
    pub const GENERIC: &'static str = "generic";

    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(tag.as_ref().trim().to_lowercase())
    }

    pub fn generic() -> Self {
        Self(Self::GENERIC.to_string())
    }

    pub fn is_generic(&self) -> bool {
        self.0 == Self::GENERIC
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VendorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VendorTag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque image reference handed to agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageInput {
    /// Remote image, fetched by the model provider.
    Url { url: String },
    /// Raw image bytes plus MIME type.
    Bytes { data: Vec<u8>, mime: String },
}

impl ImageInput {
    pub fn url(url: impl Into<String>) -> Self {
        ImageInput::Url { url: url.into() }
    }

    pub fn bytes(data: Vec<u8>, mime: impl Into<String>) -> Self {
        ImageInput::Bytes {
            data,
            mime: mime.into(),
        }
    }

    /// True when there is nothing to extract from.
    pub fn is_empty(&self) -> bool {
        match self {
            ImageInput::Url { url } => url.trim().is_empty(),
            ImageInput::Bytes { data, .. } => data.is_empty(),
        }
    }

    /// Render as a URL a vision model accepts: pass-through for remote
    /// images, base64 data URL for raw bytes.
    pub fn to_model_url(&self) -> String {
        match self {
            ImageInput::Url { url } => url.clone(),
            ImageInput::Bytes { data, mime } => {
                let encoded = base64::engine::general_purpose::STANDARD.encode(data);
                format!("data:{};base64,{}", mime, encoded)
            }
        }
    }
}

/// A line item on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
}

/// Normalized receipt payload produced by a parsing agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptData {
    #[serde(default)]
    pub vendor_name: Option<String>,
    /// Purchase date as reported on the receipt (ISO 8601 where possible).
    #[serde(default)]
    pub purchase_date: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub subtotal: Option<f64>,
    #[serde(default)]
    pub tax: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// Outcome of a single agent invocation. Produced once per call and never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInvocationResult {
    pub agent_name: String,
    pub success: bool,
    /// Confidence score in 0..=100.
    pub confidence: f64,
    /// Actual monetary cost of the invocation (USD).
    pub cost: f64,
    pub processing_time_ms: u64,
    #[serde(default)]
    pub payload: Option<ReceiptData>,
    /// Vendor identified by a detection agent.
    #[serde(default)]
    pub detected_vendor: Option<VendorTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentInvocationResult {
    /// Successful parsing invocation.
    pub fn success(
        agent_name: impl Into<String>,
        confidence: f64,
        cost: f64,
        processing_time_ms: u64,
        payload: ReceiptData,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: true,
            confidence: confidence.clamp(0.0, 100.0),
            cost: cost.max(0.0),
            processing_time_ms,
            payload: Some(payload),
            detected_vendor: None,
            error: None,
        }
    }

    /// Successful vendor detection invocation.
    pub fn detection(
        agent_name: impl Into<String>,
        vendor: VendorTag,
        confidence: f64,
        cost: f64,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: true,
            confidence: confidence.clamp(0.0, 100.0),
            cost: cost.max(0.0),
            processing_time_ms,
            payload: None,
            detected_vendor: Some(vendor),
            error: None,
        }
    }

    /// Failed invocation (the agent ran and reported an error).
    pub fn failure(
        agent_name: impl Into<String>,
        error: impl Into<String>,
        cost: f64,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: false,
            confidence: 0.0,
            cost: cost.max(0.0),
            processing_time_ms,
            payload: None,
            detected_vendor: None,
            error: Some(error.into()),
        }
    }

    /// Marker for an invocation that was never attempted because the
    /// remaining budget could not cover its declared estimate.
    pub fn budget_skipped(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            success: false,
            confidence: 0.0,
            cost: 0.0,
            processing_time_ms: 0,
            payload: None,
            detected_vendor: None,
            error: Some("budget exhausted before invocation".to_string()),
        }
    }

    /// True when this result carries a payload a caller could use.
    pub fn has_usable_payload(&self) -> bool {
        self.success && self.payload.is_some()
    }
}

/// A single extraction capability with a fixed invocation signature.
///
/// `invoke` never panics and never returns `Err`: failures (network,
/// parse, upstream) are encoded in the returned result so the pipeline
/// can record them and continue to the next candidate.
#[async_trait]
pub trait ExtractionAgent: Send + Sync {
    /// Stable agent name used in result metadata and cost breakdowns.
    fn name(&self) -> &str;

    /// Declared per-invocation cost estimate (USD), used for budget
    /// reservations before the actual cost is known.
    fn estimated_cost(&self) -> f64;

    /// Declared typical latency, for diagnostics.
    fn estimated_latency_ms(&self) -> u64;

    /// Whether the agent is currently usable (e.g. its backend is configured).
    fn available(&self) -> bool {
        true
    }

    /// Run the extraction strategy against an image.
    async fn invoke(&self, image: &ImageInput) -> AgentInvocationResult;
}

/// Shared agent handle.
pub type AgentRef = Arc<dyn ExtractionAgent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_tag_normalizes_case_and_whitespace() {
        assert_eq!(VendorTag::new("  Walmart "), VendorTag::new("walmart"));
        assert_eq!(VendorTag::new("GENERIC"), VendorTag::generic());
        assert!(VendorTag::new("Generic").is_generic());
    }

    #[test]
    fn empty_image_inputs_detected() {
        assert!(ImageInput::url("   ").is_empty());
        assert!(ImageInput::bytes(vec![], "image/png").is_empty());
        assert!(!ImageInput::url("https://example.com/r.jpg").is_empty());
    }

    #[test]
    fn bytes_render_as_data_url() {
        let input = ImageInput::bytes(vec![1, 2, 3], "image/jpeg");
        let url = input.to_model_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn confidence_is_clamped() {
        let r = AgentInvocationResult::success("a", 140.0, -0.5, 10, ReceiptData::default());
        assert_eq!(r.confidence, 100.0);
        assert_eq!(r.cost, 0.0);
    }
}
