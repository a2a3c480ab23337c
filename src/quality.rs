//! Quality assessment over pipeline stage results.
//!
//! Pure functions only: no I/O, no side effects. The orchestrator calls
//! [`assess`] once per run after choosing the final result.

use serde::{Deserialize, Serialize};

use crate::agent::AgentInvocationResult;

/// Composite quality view of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Confidence of the final chosen result, 0 when nothing succeeded.
    pub overall_confidence: f64,
    /// Stage-1 confidence, 0 when detection was skipped.
    pub vendor_detection_confidence: f64,
    /// Stage-2 confidence, 0 when parsing never ran.
    pub parsing_quality: f64,
    /// Delta vs. a non-agentic baseline extraction. Reporting only, never
    /// used for routing; 0 when no baseline value is available.
    pub improvement_over_baseline: f64,
}

/// Compute the quality assessment for a run.
///
/// `chosen` is the invocation whose payload ends up in the result
/// envelope (highest-confidence success across parsing and fallbacks).
pub fn assess(
    vendor_detection: Option<&AgentInvocationResult>,
    parsing: Option<&AgentInvocationResult>,
    chosen: Option<&AgentInvocationResult>,
    baseline_confidence: Option<f64>,
) -> QualityAssessment {
    let overall_confidence = chosen.map(|r| r.confidence).unwrap_or(0.0);
    QualityAssessment {
        overall_confidence,
        vendor_detection_confidence: vendor_detection.map(|r| r.confidence).unwrap_or(0.0),
        parsing_quality: parsing.map(|r| r.confidence).unwrap_or(0.0),
        improvement_over_baseline: baseline_confidence
            .map(|b| overall_confidence - b)
            .unwrap_or(0.0),
    }
}

/// Whether a result clears the configured quality threshold.
pub fn meets_threshold(result: &AgentInvocationResult, threshold: f64) -> bool {
    result.success && result.confidence >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ReceiptData;

    fn parsed(name: &str, confidence: f64) -> AgentInvocationResult {
        AgentInvocationResult::success(name, confidence, 0.01, 100, ReceiptData::default())
    }

    #[test]
    fn skipped_stages_report_zero() {
        let q = assess(None, None, None, None);
        assert_eq!(q.overall_confidence, 0.0);
        assert_eq!(q.vendor_detection_confidence, 0.0);
        assert_eq!(q.parsing_quality, 0.0);
        assert_eq!(q.improvement_over_baseline, 0.0);
    }

    #[test]
    fn stage_confidences_pass_through() {
        let detection = AgentInvocationResult::detection(
            "vendor-detector",
            crate::agent::VendorTag::new("walmart"),
            81.0,
            0.005,
            40,
        );
        let parse = parsed("walmart-specialized", 92.0);
        let q = assess(Some(&detection), Some(&parse), Some(&parse), None);
        assert_eq!(q.vendor_detection_confidence, 81.0);
        assert_eq!(q.parsing_quality, 92.0);
        assert_eq!(q.overall_confidence, 92.0);
    }

    #[test]
    fn chosen_fallback_sets_overall() {
        let parse = parsed("generic-enhanced", 40.0);
        let fallback = parsed("baseline-ocr", 85.0);
        let q = assess(None, Some(&parse), Some(&fallback), None);
        assert_eq!(q.overall_confidence, 85.0);
        assert_eq!(q.parsing_quality, 40.0);
    }

    #[test]
    fn baseline_delta_only_when_available() {
        let parse = parsed("generic-enhanced", 90.0);
        let q = assess(None, Some(&parse), Some(&parse), Some(60.0));
        assert_eq!(q.improvement_over_baseline, 30.0);
    }

    #[test]
    fn threshold_requires_success() {
        let ok = parsed("a", 70.0);
        assert!(meets_threshold(&ok, 70.0));
        let failed = AgentInvocationResult::failure("a", "boom", 0.0, 10);
        assert!(!meets_threshold(&failed, 0.0));
    }
}
