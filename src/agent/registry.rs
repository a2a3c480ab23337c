//! Agent registry: maps vendor tags to ordered lists of parsing agents,
//! plus slots for the vendor detector and the ordered fallback chain.
//!
//! Registration is additive only. The registry is a shared, read-mostly
//! singleton; all mutation goes through the write lock so readers never
//! observe a partially-applied registration.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{AgentRef, VendorTag};

/// Diagnostic view of a registered agent.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AgentStatus {
    pub name: String,
    pub available: bool,
    pub declared_cost: f64,
    pub declared_latency_ms: u64,
    /// Vendor tag the agent specializes in, or the role it fills.
    pub specialization: String,
}

#[derive(Default)]
struct RegistryInner {
    detector: Option<AgentRef>,
    parsers: HashMap<VendorTag, Vec<AgentRef>>,
    fallbacks: Vec<AgentRef>,
    /// Last-resort baseline agent, always at the tail of the fallback
    /// chain and skippable per-request.
    baseline: Option<AgentRef>,
}

/// Registry of extraction agents.
pub struct AgentRegistry {
    inner: RwLock<RegistryInner>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Register the vendor detection agent. A later registration replaces
    /// an earlier one.
    pub async fn register_detector(&self, agent: AgentRef) {
        let mut inner = self.inner.write().await;
        tracing::info!(agent = agent.name(), "registered vendor detector");
        inner.detector = Some(agent);
    }

    /// Register a parsing agent for a vendor tag. Agents for the same tag
    /// are tried in registration order.
    pub async fn register(&self, tag: VendorTag, agent: AgentRef) {
        let mut inner = self.inner.write().await;
        tracing::info!(vendor = %tag, agent = agent.name(), "registered parsing agent");
        inner.parsers.entry(tag).or_default().push(agent);
    }

    /// Append an agent to the fallback chain. Chain order is registration
    /// order; the baseline agent, if any, always comes last.
    pub async fn register_fallback(&self, agent: AgentRef) {
        let mut inner = self.inner.write().await;
        tracing::info!(agent = agent.name(), "registered fallback agent");
        inner.fallbacks.push(agent);
    }

    /// Register the baseline last-resort agent. A later registration
    /// replaces an earlier one.
    pub async fn register_baseline(&self, agent: AgentRef) {
        let mut inner = self.inner.write().await;
        tracing::info!(agent = agent.name(), "registered baseline agent");
        inner.baseline = Some(agent);
    }

    /// The vendor detection agent, if one is registered.
    pub async fn detector(&self) -> Option<AgentRef> {
        self.inner.read().await.detector.clone()
    }

    /// Ordered parsing agents registered for a vendor tag. Empty when none.
    pub async fn agents_for_vendor(&self, tag: &VendorTag) -> Vec<AgentRef> {
        self.inner
            .read()
            .await
            .parsers
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    /// The generic parsing agent: first agent registered under the GENERIC
    /// tag, falling back to the head of the fallback chain.
    pub async fn generic_parser(&self) -> Option<AgentRef> {
        let inner = self.inner.read().await;
        inner
            .parsers
            .get(&VendorTag::generic())
            .and_then(|v| v.first().cloned())
            .or_else(|| inner.fallbacks.first().cloned())
            .or_else(|| inner.baseline.clone())
    }

    /// The ordered fallback chain. When `include_baseline` is false the
    /// baseline tail is omitted (per-request `skip_baseline_fallback`).
    pub async fn fallback_chain(&self, include_baseline: bool) -> Vec<AgentRef> {
        let inner = self.inner.read().await;
        let mut chain = inner.fallbacks.clone();
        if include_baseline {
            if let Some(baseline) = &inner.baseline {
                chain.push(baseline.clone());
            }
        }
        chain
    }

    /// Snapshot of every registered agent for health reporting.
    pub async fn status(&self) -> Vec<AgentStatus> {
        let inner = self.inner.read().await;
        let mut out = Vec::new();

        if let Some(detector) = &inner.detector {
            out.push(Self::describe(detector, "vendor-detection"));
        }

        let mut tags: Vec<&VendorTag> = inner.parsers.keys().collect();
        tags.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        for tag in tags {
            for agent in &inner.parsers[tag] {
                out.push(Self::describe(agent, tag.as_str()));
            }
        }

        for agent in &inner.fallbacks {
            out.push(Self::describe(agent, "fallback"));
        }

        if let Some(baseline) = &inner.baseline {
            out.push(Self::describe(baseline, "baseline"));
        }

        out
    }

    fn describe(agent: &AgentRef, specialization: &str) -> AgentStatus {
        AgentStatus {
            name: agent.name().to_string(),
            available: agent.available(),
            declared_cost: agent.estimated_cost(),
            declared_latency_ms: agent.estimated_latency_ms(),
            specialization: specialization.to_string(),
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared registry for concurrent access.
pub type SharedAgentRegistry = Arc<AgentRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentInvocationResult, ExtractionAgent, ImageInput, ReceiptData};
    use async_trait::async_trait;

    struct DummyAgent {
        name: String,
        cost: f64,
    }

    impl DummyAgent {
        fn arc(name: &str, cost: f64) -> AgentRef {
            Arc::new(Self {
                name: name.to_string(),
                cost,
            })
        }
    }

    #[async_trait]
    impl ExtractionAgent for DummyAgent {
        fn name(&self) -> &str {
            &self.name
        }
        fn estimated_cost(&self) -> f64 {
            self.cost
        }
        fn estimated_latency_ms(&self) -> u64 {
            100
        }
        async fn invoke(&self, _image: &ImageInput) -> AgentInvocationResult {
            AgentInvocationResult::success(&self.name, 90.0, self.cost, 5, ReceiptData::default())
        }
    }

    #[tokio::test]
    async fn unknown_vendor_yields_empty_list() {
        let registry = AgentRegistry::new();
        let agents = registry.agents_for_vendor(&VendorTag::new("nowhere")).await;
        assert!(agents.is_empty());
    }

    #[tokio::test]
    async fn registration_order_is_preserved() {
        let registry = AgentRegistry::new();
        let tag = VendorTag::new("walmart");
        registry.register(tag.clone(), DummyAgent::arc("first", 0.01)).await;
        registry.register(tag.clone(), DummyAgent::arc("second", 0.02)).await;

        let agents = registry.agents_for_vendor(&tag).await;
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].name(), "first");
        assert_eq!(agents[1].name(), "second");
    }

    #[tokio::test]
    async fn generic_parser_prefers_generic_tag_over_fallback_head() {
        let registry = AgentRegistry::new();
        registry.register_baseline(DummyAgent::arc("baseline-ocr", 0.001)).await;
        assert_eq!(registry.generic_parser().await.unwrap().name(), "baseline-ocr");

        registry
            .register(VendorTag::generic(), DummyAgent::arc("generic-enhanced", 0.01))
            .await;
        assert_eq!(
            registry.generic_parser().await.unwrap().name(),
            "generic-enhanced"
        );
    }

    #[tokio::test]
    async fn fallback_chain_baseline_is_last_and_skippable() {
        let registry = AgentRegistry::new();
        registry.register_baseline(DummyAgent::arc("baseline-ocr", 0.001)).await;
        registry.register_fallback(DummyAgent::arc("generic-enhanced", 0.01)).await;

        let chain = registry.fallback_chain(true).await;
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].name(), "generic-enhanced");
        assert_eq!(chain[1].name(), "baseline-ocr");

        let without = registry.fallback_chain(false).await;
        assert_eq!(without.len(), 1);
        assert_eq!(without[0].name(), "generic-enhanced");
    }

    #[tokio::test]
    async fn status_lists_every_registration() {
        let registry = AgentRegistry::new();
        registry.register_detector(DummyAgent::arc("detector", 0.005)).await;
        registry
            .register(VendorTag::new("costco"), DummyAgent::arc("costco-parser", 0.02))
            .await;
        registry.register_fallback(DummyAgent::arc("generic-enhanced", 0.01)).await;
        registry.register_baseline(DummyAgent::arc("baseline-ocr", 0.001)).await;

        let status = registry.status().await;
        assert_eq!(status.len(), 4);
        assert_eq!(status[0].specialization, "vendor-detection");
        assert_eq!(status[1].specialization, "costco");
        assert_eq!(status[2].specialization, "fallback");
        assert_eq!(status[3].specialization, "baseline");
    }
}
