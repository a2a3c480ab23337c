//! The pipeline orchestrator.
//!
//! Sequences vendor detection, parsing, and the fallback chain for one
//! receipt, enforcing reserve-before-invoke budget discipline at every
//! decision point. Individual agent failures are recorded and the
//! pipeline moves on; the run as a whole fails only when every candidate
//! was exhausted without a usable payload.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::agent::{
    AgentInvocationResult, AgentRef, AgentStatus, ImageInput, SharedAgentRegistry, VendorTag,
};
use crate::budget::BudgetTracker;
use crate::config::{OrchestratorConfig, SharedConfigStore};
use crate::quality;

use super::result::{
    AgenticResult, ExtractionRequest, PipelineError, PipelineRun, ResultMetadata,
};

/// Read-only introspection: registered agents plus the active config.
#[derive(Debug, Serialize)]
pub struct AgentStatusReport {
    pub agents: Vec<AgentStatus>,
    pub config: OrchestratorConfig,
}

/// Pipeline orchestrator. Shared across requests; all per-run state
/// (budget tracker, pipeline record) lives on the stack of
/// `process_receipt`.
pub struct Orchestrator {
    config: SharedConfigStore,
    registry: SharedAgentRegistry,
}

impl Orchestrator {
    pub fn new(config: SharedConfigStore, registry: SharedAgentRegistry) -> Self {
        Self { config, registry }
    }

    /// Run the full extraction pipeline for one receipt.
    ///
    /// Returns `Err` only for invalid input; every other failure mode is
    /// reported inside the [`AgenticResult`] envelope.
    pub async fn process_receipt(
        &self,
        request: ExtractionRequest,
    ) -> Result<AgenticResult, PipelineError> {
        if request.image.is_empty() {
            return Err(PipelineError::InputInvalid {
                message: "no image supplied".to_string(),
            });
        }

        let config = self.config.current().await;
        let ceiling = request
            .options
            .max_cost
            .map_or(config.cost_budget, |m| m.min(config.cost_budget));
        let mut budget = BudgetTracker::new(ceiling);
        let mut run = PipelineRun::new();
        let timeout = Duration::from_secs(config.agent_timeout_secs.max(1));

        let mut agents_used: Vec<String> = Vec::new();
        let mut cost_breakdown: BTreeMap<String, f64> = BTreeMap::new();
        let mut fallbacks_triggered: Vec<String> = Vec::new();
        let mut fallback_skipped_over_budget = false;
        let mut fallback_chain_exhausted = false;
        // True while the most recent pipeline event was a budget skip
        // rather than an actual invocation. Decides whether an overall
        // failure reads as budget exhaustion or as candidate exhaustion.
        let mut last_event_budget_skip = false;
        let mut vendor = VendorTag::generic();

        tracing::info!(run_id = %run.id, ceiling, "starting extraction pipeline");

        let dead_on_arrival = budget.exhausted();
        if dead_on_arrival {
            tracing::warn!(run_id = %run.id, "effective cost ceiling is zero, failing fast");
            last_event_budget_skip = true;
        } else {
            // Stage 1: vendor detection. Skipped entirely for a forced
            // vendor or when detection is disabled.
            let forced = request.options.forced_vendor.clone();
            if let Some(forced_tag) = &forced {
                vendor = forced_tag.clone();
                tracing::debug!(run_id = %run.id, vendor = %vendor, "vendor forced, skipping detection");
            } else if config.enable_vendor_detection {
                if let Some(detector) = self.registry.detector().await {
                    if budget.reserve(detector.estimated_cost()) {
                        let result =
                            Self::invoke_with_timeout(&detector, &request.image, timeout).await;
                        budget.commit(result.cost);
                        agents_used.push(result.agent_name.clone());
                        *cost_breakdown.entry(result.agent_name.clone()).or_insert(0.0) +=
                            result.cost;
                        if result.success {
                            if let Some(tag) = &result.detected_vendor {
                                vendor = tag.clone();
                            }
                        }
                        run.record_stage1(result);
                    } else {
                        last_event_budget_skip = true;
                        run.record_stage1(AgentInvocationResult::budget_skipped(detector.name()));
                    }
                }
            }

            // A detected tag with no registered agent is reported as
            // generic; a forced tag is the caller's choice and kept.
            if forced.is_none()
                && !vendor.is_generic()
                && self.registry.agents_for_vendor(&vendor).await.is_empty()
            {
                tracing::debug!(run_id = %run.id, vendor = %vendor, "no agent for detected vendor");
                vendor = VendorTag::generic();
            }

            // Agent selection: specialized parser when enabled and
            // registered, generic parser otherwise.
            let mut parser: Option<AgentRef> = None;
            if config.enable_specialized_parsing {
                parser = self
                    .registry
                    .agents_for_vendor(&vendor)
                    .await
                    .into_iter()
                    .next();
            }
            if parser.is_none() {
                parser = self.registry.generic_parser().await;
            }

            // Stage 2: parsing, under the same reserve/commit discipline.
            if let Some(agent) = &parser {
                if budget.reserve(agent.estimated_cost()) {
                    let result = Self::invoke_with_timeout(agent, &request.image, timeout).await;
                    budget.commit(result.cost);
                    agents_used.push(result.agent_name.clone());
                    *cost_breakdown.entry(result.agent_name.clone()).or_insert(0.0) += result.cost;
                    run.record_stage2(result);
                    last_event_budget_skip = false;
                } else {
                    last_event_budget_skip = true;
                    run.record_stage2(AgentInvocationResult::budget_skipped(agent.name()));
                }
            } else {
                tracing::warn!(run_id = %run.id, "no parsing agent available for this request");
            }

            // Stage 3: fallback chain, triggered by outright failure or a
            // below-threshold result.
            let stage2_satisfied = run
                .stage2
                .as_ref()
                .map_or(false, |r| quality::meets_threshold(r, config.quality_threshold));
            if config.enable_fallbacks && !stage2_satisfied {
                let stage2_agent = run.stage2.as_ref().map(|r| r.agent_name.clone());
                let chain = self
                    .registry
                    .fallback_chain(!request.options.skip_baseline_fallback)
                    .await;
                let mut satisfied = false;

                for agent in chain {
                    // The fallback chain never repeats the stage-2 agent.
                    if stage2_agent.as_deref() == Some(agent.name()) {
                        continue;
                    }
                    if !budget.reserve(agent.estimated_cost()) {
                        tracing::warn!(
                            run_id = %run.id,
                            agent = agent.name(),
                            remaining = budget.remaining(),
                            "fallback skipped: budget exhausted"
                        );
                        fallback_skipped_over_budget = true;
                        last_event_budget_skip = true;
                        break;
                    }
                    let result = Self::invoke_with_timeout(&agent, &request.image, timeout).await;
                    budget.commit(result.cost);
                    agents_used.push(result.agent_name.clone());
                    fallbacks_triggered.push(result.agent_name.clone());
                    *cost_breakdown.entry(result.agent_name.clone()).or_insert(0.0) += result.cost;
                    let ok = quality::meets_threshold(&result, config.quality_threshold);
                    run.record_fallback(result);
                    last_event_budget_skip = false;
                    if ok {
                        satisfied = true;
                        break;
                    }
                }

                if !satisfied && !fallback_skipped_over_budget {
                    fallback_chain_exhausted = true;
                }
            }
        }

        // Result assembly: highest-confidence successful invocation across
        // stages 2-3; on a tie the later attempt wins.
        let mut chosen: Option<&AgentInvocationResult> = None;
        for candidate in run.stage2.iter().chain(run.fallbacks.iter()) {
            if candidate.has_usable_payload()
                && chosen.map_or(true, |c| candidate.confidence >= c.confidence)
            {
                chosen = Some(candidate);
            }
        }

        let assessment = quality::assess(run.stage1.as_ref(), run.stage2.as_ref(), chosen, None);
        let data = chosen.and_then(|c| c.payload.clone());
        let success = data.is_some();

        // Budget exhaustion is reported only when the budget blocked the
        // last remaining candidate; when an agent was still attempted
        // after a skip, its failure is the more specific reason.
        let error = if success {
            None
        } else if last_event_budget_skip {
            Some(PipelineError::BudgetExhausted {
                message: if dead_on_arrival {
                    "effective cost ceiling is zero or below".to_string()
                } else {
                    format!(
                        "remaining budget {:.4} of ceiling {:.4} cannot cover the next candidate",
                        budget.remaining(),
                        budget.ceiling()
                    )
                },
            })
        } else {
            let last_reason = run
                .fallbacks
                .last()
                .or(run.stage2.as_ref())
                .or(run.stage1.as_ref())
                .and_then(|r| r.error.clone())
                .unwrap_or_else(|| "no extraction agent produced a usable result".to_string());
            Some(PipelineError::AllCandidatesExhausted {
                message: last_reason,
            })
        };

        tracing::info!(
            run_id = %run.id,
            success,
            total_cost = run.total_cost,
            confidence = assessment.overall_confidence,
            agents = agents_used.len(),
            "pipeline finished"
        );

        Ok(AgenticResult {
            success,
            data,
            quality: assessment,
            metadata: ResultMetadata {
                vendor_type: vendor,
                agents_used,
                fallbacks_triggered,
                cost_breakdown,
                fallback_skipped_over_budget,
                fallback_chain_exhausted,
                completed_at: chrono::Utc::now(),
            },
            error,
            pipeline: run,
        })
    }

    /// Projected cost of a typical run from declared agent estimates.
    /// No agent is invoked.
    pub async fn estimate_cost(&self) -> f64 {
        let config = self.config.current().await;
        let mut total = 0.0;
        if config.enable_vendor_detection {
            if let Some(detector) = self.registry.detector().await {
                total += detector.estimated_cost();
            }
        }
        if let Some(parser) = self.registry.generic_parser().await {
            total += parser.estimated_cost();
        }
        total
    }

    /// Read-only introspection of registered agents and current config.
    pub async fn agent_status(&self) -> AgentStatusReport {
        AgentStatusReport {
            agents: self.registry.status().await,
            config: self.config.current().await,
        }
    }

    /// Run one agent invocation under the per-run timeout. A timed-out
    /// call counts as a failed invocation for its stage.
    async fn invoke_with_timeout(
        agent: &AgentRef,
        image: &ImageInput,
        timeout: Duration,
    ) -> AgentInvocationResult {
        match tokio::time::timeout(timeout, agent.invoke(image)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(agent = agent.name(), ?timeout, "agent invocation timed out");
                AgentInvocationResult::failure(
                    agent.name(),
                    format!("invocation timed out after {}s", timeout.as_secs()),
                    0.0,
                    timeout.as_millis() as u64,
                )
            }
        }
    }
}
