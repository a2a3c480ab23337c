//! Pipeline orchestrator: vendor detection, parsing, and fallback stages
//! under a per-run cost budget and a quality threshold.

mod orchestrator;
mod result;

pub use orchestrator::{AgentStatusReport, Orchestrator};
pub use result::{
    AgenticResult, ExtractionOptions, ExtractionRequest, PipelineError, PipelineRun,
    ResultMetadata,
};
