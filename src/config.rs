//! Process-wide orchestrator configuration.
//!
//! A single lock-protected structure with snapshot reads and atomic
//! patch-merge updates. No persistence: defaults (plus environment
//! overrides) are re-established on process restart.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
}

/// Orchestrator configuration. Read as a snapshot by every pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub mode: Mode,
    pub enable_vendor_detection: bool,
    pub enable_specialized_parsing: bool,
    pub enable_fallbacks: bool,
    /// Minimum acceptable confidence (0..=100) below which fallback is
    /// triggered.
    pub quality_threshold: f64,
    /// Default per-run cost ceiling in USD; a request's `max_cost` can
    /// only lower it.
    pub cost_budget: f64,
    /// Per-invocation timeout; a timed-out agent call counts as a failed
    /// invocation for its stage.
    pub agent_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Development,
            enable_vendor_detection: true,
            enable_specialized_parsing: true,
            enable_fallbacks: true,
            quality_threshold: 70.0,
            cost_budget: 0.10,
            agent_timeout_secs: 60,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults with environment overrides applied, used at process start.
    ///
    /// - `PIPELINE_MODE` - "development" or "production"
    /// - `QUALITY_THRESHOLD` - 0..=100
    /// - `COST_BUDGET` - USD per run
    /// - `AGENT_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(mode) = std::env::var("PIPELINE_MODE") {
            if mode.eq_ignore_ascii_case("production") {
                config.mode = Mode::Production;
            }
        }
        if let Some(threshold) = env_f64("QUALITY_THRESHOLD") {
            config.quality_threshold = threshold.clamp(0.0, 100.0);
        }
        if let Some(budget) = env_f64("COST_BUDGET") {
            config.cost_budget = budget.max(0.0);
        }
        if let Ok(timeout) = std::env::var("AGENT_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.agent_timeout_secs = secs;
            }
        }
        config
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Partial update to the configuration. Absent fields keep their current
/// value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub enable_vendor_detection: Option<bool>,
    #[serde(default)]
    pub enable_specialized_parsing: Option<bool>,
    #[serde(default)]
    pub enable_fallbacks: Option<bool>,
    #[serde(default)]
    pub quality_threshold: Option<f64>,
    #[serde(default)]
    pub cost_budget: Option<f64>,
    #[serde(default)]
    pub agent_timeout_secs: Option<u64>,
}

/// Rejection of a malformed configuration update.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("quality_threshold must be within 0..=100, got {0}")]
    ThresholdOutOfRange(f64),
    #[error("cost_budget must be non-negative, got {0}")]
    NegativeBudget(f64),
    #[error("agent_timeout_secs must be positive")]
    ZeroTimeout,
}

/// In-memory configuration store with snapshot reads and atomic updates.
#[derive(Debug)]
pub struct ConfigStore {
    config: RwLock<OrchestratorConfig>,
}

impl ConfigStore {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Read-only snapshot of the current configuration.
    pub async fn current(&self) -> OrchestratorConfig {
        self.config.read().await.clone()
    }

    /// Merge a patch over the current configuration and return the new
    /// snapshot. Validation happens against the merged result, so an
    /// invalid patch leaves the stored configuration untouched.
    pub async fn update(&self, patch: ConfigPatch) -> Result<OrchestratorConfig, ConfigError> {
        let mut config = self.config.write().await;
        let mut merged = config.clone();

        if let Some(mode) = patch.mode {
            merged.mode = mode;
        }
        if let Some(v) = patch.enable_vendor_detection {
            merged.enable_vendor_detection = v;
        }
        if let Some(v) = patch.enable_specialized_parsing {
            merged.enable_specialized_parsing = v;
        }
        if let Some(v) = patch.enable_fallbacks {
            merged.enable_fallbacks = v;
        }
        if let Some(threshold) = patch.quality_threshold {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(ConfigError::ThresholdOutOfRange(threshold));
            }
            merged.quality_threshold = threshold;
        }
        if let Some(budget) = patch.cost_budget {
            if budget < 0.0 {
                return Err(ConfigError::NegativeBudget(budget));
            }
            merged.cost_budget = budget;
        }
        if let Some(timeout) = patch.agent_timeout_secs {
            if timeout == 0 {
                return Err(ConfigError::ZeroTimeout);
            }
            merged.agent_timeout_secs = timeout;
        }

        tracing::info!(
            quality_threshold = merged.quality_threshold,
            cost_budget = merged.cost_budget,
            "configuration updated"
        );
        *config = merged.clone();
        Ok(merged)
    }
}

/// Shared configuration store for concurrent access.
pub type SharedConfigStore = Arc<ConfigStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_is_stable_between_updates() {
        let store = ConfigStore::new(OrchestratorConfig::default());
        let a = store.current().await;
        let b = store.current().await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn patch_merges_only_supplied_fields() {
        let store = ConfigStore::new(OrchestratorConfig::default());
        let updated = store
            .update(ConfigPatch {
                quality_threshold: Some(85.0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.quality_threshold, 85.0);
        assert!(updated.enable_fallbacks);
        assert_eq!(updated.cost_budget, OrchestratorConfig::default().cost_budget);
    }

    #[tokio::test]
    async fn invalid_patch_leaves_config_untouched() {
        let store = ConfigStore::new(OrchestratorConfig::default());
        let err = store
            .update(ConfigPatch {
                quality_threshold: Some(140.0),
                enable_fallbacks: Some(false),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err, ConfigError::ThresholdOutOfRange(140.0));

        let current = store.current().await;
        assert!(current.enable_fallbacks);
    }

    #[tokio::test]
    async fn negative_budget_rejected() {
        let store = ConfigStore::new(OrchestratorConfig::default());
        let err = store
            .update(ConfigPatch {
                cost_budget: Some(-0.5),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err, ConfigError::NegativeBudget(-0.5));
    }
}
