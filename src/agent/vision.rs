//! LLM-backed extraction agents.
//!
//! Four roles share the same mechanics (send image + prompt to a vision
//! model, parse the JSON reply, price the call from token usage):
//! - vendor detection
//! - vendor-specialized parsing (one agent per known vendor)
//! - generic enhanced parsing
//! - baseline OCR (cheap model, minimal prompt)

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;

use crate::llm::{ChatMessage, ChatOptions, ChatResponse, Role, SharedLlmClient};

use super::{AgentInvocationResult, ExtractionAgent, ImageInput, ReceiptData, VendorTag};

/// Model binding for an agent: which model to call and what it costs.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub model: String,
    /// USD per 1k prompt tokens.
    pub prompt_price_per_1k: f64,
    /// USD per 1k completion tokens.
    pub completion_price_per_1k: f64,
    /// Declared per-invocation estimate used for budget reservations.
    pub estimated_cost: f64,
    pub estimated_latency_ms: u64,
}

impl ModelSpec {
    /// Actual cost of a response, from token usage. Falls back to the
    /// declared estimate when the provider omitted usage data.
    fn actual_cost(&self, response: &ChatResponse) -> f64 {
        match &response.usage {
            Some(u) => {
                (u.prompt_tokens as f64 / 1000.0) * self.prompt_price_per_1k
                    + (u.completion_tokens as f64 / 1000.0) * self.completion_price_per_1k
            }
            None => self.estimated_cost,
        }
    }
}

/// Strip markdown code fences some models wrap JSON replies in.
fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Vendor detection agent: identifies which vendor issued the receipt.
pub struct VendorDetectionAgent {
    llm: SharedLlmClient,
    spec: ModelSpec,
    known_vendors: Vec<VendorTag>,
}

#[derive(Debug, Deserialize)]
struct DetectionReply {
    vendor: String,
    confidence: f64,
}

impl VendorDetectionAgent {
    pub const NAME: &'static str = "vendor-detector";

    pub fn new(llm: SharedLlmClient, spec: ModelSpec, known_vendors: Vec<VendorTag>) -> Self {
        Self {
            llm,
            spec,
            known_vendors,
        }
    }

    fn prompt(&self) -> String {
        let vendors: Vec<&str> = self.known_vendors.iter().map(|v| v.as_str()).collect();
        format!(
            "Identify the vendor on this receipt. Known vendors: [{}]. \
             Reply with JSON only: {{\"vendor\": \"<vendor or generic>\", \
             \"confidence\": <0-100>}}. Use \"generic\" if the vendor is \
             not in the list or unreadable.",
            vendors.join(", ")
        )
    }

    fn parse_reply(reply: &str) -> Result<DetectionReply, serde_json::Error> {
        serde_json::from_str(strip_code_fences(reply))
    }
}

#[async_trait]
impl ExtractionAgent for VendorDetectionAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn estimated_cost(&self) -> f64 {
        self.spec.estimated_cost
    }

    fn estimated_latency_ms(&self) -> u64 {
        self.spec.estimated_latency_ms
    }

    async fn invoke(&self, image: &ImageInput) -> AgentInvocationResult {
        let start = Instant::now();
        let messages = [ChatMessage::with_image(
            Role::User,
            self.prompt(),
            image.to_model_url(),
        )];
        let options = ChatOptions {
            temperature: Some(0.0),
            max_tokens: Some(200),
        };

        match self.llm.chat_completion(&self.spec.model, &messages, options).await {
            Ok(response) => {
                let elapsed = start.elapsed().as_millis() as u64;
                let cost = self.spec.actual_cost(&response);
                let reply = response.content.as_deref().unwrap_or_default();
                match Self::parse_reply(reply) {
                    Ok(detected) => AgentInvocationResult::detection(
                        Self::NAME,
                        VendorTag::new(&detected.vendor),
                        detected.confidence,
                        cost,
                        elapsed,
                    ),
                    Err(e) => {
                        tracing::warn!(error = %e, "vendor detection reply was not valid JSON");
                        AgentInvocationResult::failure(
                            Self::NAME,
                            format!("unparseable detection reply: {}", e),
                            cost,
                            elapsed,
                        )
                    }
                }
            }
            Err(e) => AgentInvocationResult::failure(
                Self::NAME,
                e.to_string(),
                0.0,
                start.elapsed().as_millis() as u64,
            ),
        }
    }
}

/// Receipt parsing agent. Covers the specialized, generic-enhanced, and
/// baseline-OCR roles; they differ only in name, prompt, and model spec.
pub struct ReceiptParsingAgent {
    name: String,
    llm: SharedLlmClient,
    spec: ModelSpec,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct ParsingReply {
    confidence: f64,
    receipt: ReceiptData,
}

const RECEIPT_SCHEMA_HINT: &str = "Reply with JSON only: {\"confidence\": <0-100>, \
    \"receipt\": {\"vendor_name\": str|null, \"purchase_date\": \"YYYY-MM-DD\"|null, \
    \"currency\": str|null, \"subtotal\": num|null, \"tax\": num|null, \"total\": num|null, \
    \"line_items\": [{\"description\": str, \"quantity\": num|null, \
    \"unit_price\": num|null, \"total\": num|null}]}}";

impl ReceiptParsingAgent {
    pub const GENERIC_ENHANCED: &'static str = "generic-enhanced";
    pub const BASELINE_OCR: &'static str = "baseline-ocr";

    /// Parser specialized for one vendor's receipt layout.
    pub fn specialized(llm: SharedLlmClient, spec: ModelSpec, vendor: &VendorTag) -> Self {
        Self {
            name: format!("{}-specialized", vendor),
            llm,
            spec,
            prompt: format!(
                "You are an expert at reading {} receipts. Extract every field \
                 and line item, applying your knowledge of this vendor's layout, \
                 abbreviations, and tax lines. {}",
                vendor, RECEIPT_SCHEMA_HINT
            ),
        }
    }

    /// Generic enhanced parser for receipts from any vendor.
    pub fn generic_enhanced(llm: SharedLlmClient, spec: ModelSpec) -> Self {
        Self {
            name: Self::GENERIC_ENHANCED.to_string(),
            llm,
            spec,
            prompt: format!(
                "Extract structured purchase data from this receipt image. \
                 Be thorough with line items and totals. {}",
                RECEIPT_SCHEMA_HINT
            ),
        }
    }

    /// Cheap baseline OCR pass, last resort in the fallback chain.
    pub fn baseline_ocr(llm: SharedLlmClient, spec: ModelSpec) -> Self {
        Self {
            name: Self::BASELINE_OCR.to_string(),
            llm,
            spec,
            prompt: format!(
                "Read the text on this receipt and fill in whatever fields \
                 you can. {}",
                RECEIPT_SCHEMA_HINT
            ),
        }
    }

    fn parse_reply(reply: &str) -> Result<ParsingReply, serde_json::Error> {
        serde_json::from_str(strip_code_fences(reply))
    }
}

#[async_trait]
impl ExtractionAgent for ReceiptParsingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn estimated_cost(&self) -> f64 {
        self.spec.estimated_cost
    }

    fn estimated_latency_ms(&self) -> u64 {
        self.spec.estimated_latency_ms
    }

    async fn invoke(&self, image: &ImageInput) -> AgentInvocationResult {
        let start = Instant::now();
        let messages = [ChatMessage::with_image(
            Role::User,
            self.prompt.clone(),
            image.to_model_url(),
        )];
        let options = ChatOptions {
            temperature: Some(0.0),
            max_tokens: Some(2000),
        };

        match self.llm.chat_completion(&self.spec.model, &messages, options).await {
            Ok(response) => {
                let elapsed = start.elapsed().as_millis() as u64;
                let cost = self.spec.actual_cost(&response);
                let reply = response.content.as_deref().unwrap_or_default();
                match Self::parse_reply(reply) {
                    Ok(parsed) => AgentInvocationResult::success(
                        &self.name,
                        parsed.confidence,
                        cost,
                        elapsed,
                        parsed.receipt,
                    ),
                    Err(e) => {
                        tracing::warn!(
                            agent = %self.name,
                            error = %e,
                            "parsing reply was not valid JSON"
                        );
                        AgentInvocationResult::failure(
                            &self.name,
                            format!("unparseable parsing reply: {}", e),
                            cost,
                            elapsed,
                        )
                    }
                }
            }
            Err(e) => AgentInvocationResult::failure(
                &self.name,
                e.to_string(),
                0.0,
                start.elapsed().as_millis() as u64,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_fences_are_stripped() {
        let fenced = "```json\n{\"vendor\": \"walmart\", \"confidence\": 88}\n```";
        let parsed = VendorDetectionAgent::parse_reply(fenced).unwrap();
        assert_eq!(parsed.vendor, "walmart");
        assert_eq!(parsed.confidence, 88.0);
    }

    #[test]
    fn bare_json_reply_parses() {
        let reply = "{\"confidence\": 72, \"receipt\": {\"vendor_name\": \"Costco\", \
                     \"total\": 41.97, \"line_items\": []}}";
        let parsed = ReceiptParsingAgent::parse_reply(reply).unwrap();
        assert_eq!(parsed.confidence, 72.0);
        assert_eq!(parsed.receipt.vendor_name.as_deref(), Some("Costco"));
        assert_eq!(parsed.receipt.total, Some(41.97));
    }

    #[test]
    fn malformed_reply_is_an_error() {
        assert!(ReceiptParsingAgent::parse_reply("the total is $41.97").is_err());
    }

    #[test]
    fn cost_falls_back_to_estimate_without_usage() {
        let spec = ModelSpec {
            model: "test".into(),
            prompt_price_per_1k: 0.01,
            completion_price_per_1k: 0.03,
            estimated_cost: 0.02,
            estimated_latency_ms: 500,
        };
        let response = ChatResponse {
            content: None,
            finish_reason: None,
            usage: None,
            model: None,
        };
        assert_eq!(spec.actual_cost(&response), 0.02);

        let with_usage = ChatResponse {
            usage: Some(crate::llm::TokenUsage::new(1000, 500)),
            ..response
        };
        let cost = spec.actual_cost(&with_usage);
        assert!((cost - 0.025).abs() < 1e-9);
    }
}
