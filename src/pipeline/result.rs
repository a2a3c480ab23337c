//! Request and result envelope types for the extraction pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::agent::{AgentInvocationResult, ImageInput, ReceiptData, VendorTag};
use crate::quality::QualityAssessment;

/// Per-request options. Immutable once created.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionOptions {
    /// Exclude the baseline OCR agent from the fallback chain.
    #[serde(default)]
    pub skip_baseline_fallback: bool,
    /// Skip vendor detection and parse as this vendor.
    #[serde(default)]
    pub forced_vendor: Option<VendorTag>,
    /// Per-request cost ceiling (USD). The effective ceiling is the
    /// smaller of this and the configured `cost_budget`.
    #[serde(default)]
    pub max_cost: Option<f64>,
}

/// A receipt extraction request.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub image: ImageInput,
    pub options: ExtractionOptions,
}

impl ExtractionRequest {
    pub fn new(image: ImageInput) -> Self {
        Self {
            image,
            options: ExtractionOptions::default(),
        }
    }

    pub fn with_options(image: ImageInput, options: ExtractionOptions) -> Self {
        Self { image, options }
    }
}

/// Pipeline failure taxonomy.
///
/// Only `InputInvalid` and `ConfigurationInvalid` are surfaced as early
/// returns; everything else is accumulated into the result envelope so
/// callers always get pipeline metadata to diagnose what was tried.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum PipelineError {
    #[error("invalid input: {message}")]
    InputInvalid { message: String },
    #[error("budget exhausted: {message}")]
    BudgetExhausted { message: String },
    /// A specific agent raised an error. Non-fatal: inside a run these
    /// failures travel as `AgentInvocationResult.error` strings and the
    /// pipeline moves on, so the orchestrator never puts this variant in
    /// the envelope itself. It exists for callers that need a single
    /// invocation failure as a standalone typed error.
    #[error("agent {agent} failed: {message}")]
    AgentInvocationFailed { agent: String, message: String },
    #[error("all extraction candidates exhausted: {message}")]
    AllCandidatesExhausted { message: String },
    #[error("invalid configuration: {message}")]
    ConfigurationInvalid { message: String },
}

/// Record of a single pipeline run: one invocation per stage plus any
/// fallback attempts, with cost and duration totals. Stages run
/// sequentially (stage 2 depends on stage 1's output), so durations sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    /// Vendor detection result; `None` when the stage was skipped.
    pub stage1: Option<AgentInvocationResult>,
    /// Parsing result; `None` when no parsing agent was available.
    pub stage2: Option<AgentInvocationResult>,
    /// Fallback invocations in attempt order.
    pub fallbacks: Vec<AgentInvocationResult>,
    pub total_cost: f64,
    pub total_processing_time_ms: u64,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage1: None,
            stage2: None,
            fallbacks: Vec::new(),
            total_cost: 0.0,
            total_processing_time_ms: 0,
        }
    }

    pub fn record_stage1(&mut self, result: AgentInvocationResult) {
        self.total_cost += result.cost;
        self.total_processing_time_ms += result.processing_time_ms;
        self.stage1 = Some(result);
    }

    pub fn record_stage2(&mut self, result: AgentInvocationResult) {
        self.total_cost += result.cost;
        self.total_processing_time_ms += result.processing_time_ms;
        self.stage2 = Some(result);
    }

    pub fn record_fallback(&mut self, result: AgentInvocationResult) {
        self.total_cost += result.cost;
        self.total_processing_time_ms += result.processing_time_ms;
        self.fallbacks.push(result);
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata about what the pipeline tried, for diagnostics and billing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Vendor the receipt was parsed as. Always a registered tag or
    /// generic.
    pub vendor_type: VendorTag,
    /// Every agent actually invoked, in order.
    pub agents_used: Vec<String>,
    /// Fallback agents actually invoked, in order.
    pub fallbacks_triggered: Vec<String>,
    /// Cost per agent, keyed by agent name.
    pub cost_breakdown: BTreeMap<String, f64>,
    /// The fallback chain (or part of it) was skipped because the budget
    /// could not cover another invocation.
    pub fallback_skipped_over_budget: bool,
    /// Every eligible fallback was tried without reaching the threshold.
    pub fallback_chain_exhausted: bool,
    pub completed_at: DateTime<Utc>,
}

/// Top-level result envelope returned to callers.
///
/// `success = false` only when no invocation across all stages produced a
/// usable payload; the envelope still carries the full pipeline record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgenticResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ReceiptData>,
    pub pipeline: PipelineRun,
    pub quality: QualityAssessment,
    pub metadata: ResultMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PipelineError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_totals_accumulate_across_stages() {
        let mut run = PipelineRun::new();
        run.record_stage1(AgentInvocationResult::detection(
            "vendor-detector",
            VendorTag::new("walmart"),
            90.0,
            0.005,
            120,
        ));
        run.record_stage2(AgentInvocationResult::success(
            "walmart-specialized",
            92.0,
            0.02,
            800,
            ReceiptData::default(),
        ));
        run.record_fallback(AgentInvocationResult::failure("baseline-ocr", "x", 0.001, 50));

        assert!((run.total_cost - 0.026).abs() < 1e-9);
        assert_eq!(run.total_processing_time_ms, 970);
        assert_eq!(run.fallbacks.len(), 1);
    }

    #[test]
    fn pipeline_error_serializes_with_code_tag() {
        let err = PipelineError::BudgetExhausted {
            message: "ceiling reached".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "budget_exhausted");
    }
}
