//! # Receipt Pipeline
//!
//! A cost-aware agentic pipeline that turns raw receipt images into
//! structured purchase data.
//!
//! ## Architecture
//!
//! ```text
//!   caller ──▶ Orchestrator.process_receipt(image, options)
//!                │
//!                ├─ Stage 1: vendor detection (skippable)
//!                ├─ Stage 2: specialized or generic parsing
//!                └─ Stage 3: fallback chain (conditional)
//!                      │
//!                      ▼
//!               AgenticResult envelope
//! ```
//!
//! Every stage is bounded by a per-run budget tracker
//! (reserve-before-invoke, commit-after-invoke) and a configurable
//! quality threshold that decides whether the fallback chain runs.
//!
//! ## Modules
//! - `agent`: extraction capability trait, vendor tags, agent registry
//! - `api`: HTTP boundary (extract, estimate, status, config)
//! - `budget`: per-run cost tracking
//! - `config`: process-wide runtime-mutable configuration
//! - `llm`: vision-model gateway client
//! - `pipeline`: the orchestrator and result envelope
//! - `quality`: pure quality assessment

pub mod agent;
pub mod api;
pub mod budget;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod quality;

pub use config::{ConfigStore, OrchestratorConfig};
pub use pipeline::{AgenticResult, ExtractionRequest, Orchestrator};
