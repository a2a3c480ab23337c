//! Per-run budget tracking.
//!
//! One tracker is created per pipeline run; it is never shared across
//! runs. The discipline is reserve-before-invoke, commit-after-invoke:
//! the orchestrator reserves an agent's declared estimate before calling
//! it and commits the actual cost once known. Summing costs after the
//! fact would allow unbounded overshoot.

/// Tracks cumulative spend for a single pipeline run against a ceiling.
#[derive(Debug)]
pub struct BudgetTracker {
    ceiling: f64,
    committed: f64,
    over_budget: bool,
}

impl BudgetTracker {
    /// Create a tracker with the effective ceiling for this run.
    pub fn new(ceiling: f64) -> Self {
        Self {
            ceiling: ceiling.max(0.0),
            committed: 0.0,
            over_budget: false,
        }
    }

    /// Check whether an invocation with the given estimated cost fits
    /// within the remaining ceiling. Must be called before invoking the
    /// agent; actual cost may only be known post-hoc.
    pub fn reserve(&mut self, estimated_cost: f64) -> bool {
        if self.over_budget || self.remaining() <= 0.0 {
            return false;
        }
        self.committed + estimated_cost.max(0.0) <= self.ceiling
    }

    /// Record the actual cost of an invocation that already happened.
    ///
    /// A commit that breaches the ceiling still succeeds (the money is
    /// spent), but it marks the run over-budget: no further invocation
    /// may be initiated after that.
    pub fn commit(&mut self, actual_cost: f64) {
        self.committed += actual_cost.max(0.0);
        if self.committed > self.ceiling {
            self.over_budget = true;
            tracing::warn!(
                committed = self.committed,
                ceiling = self.ceiling,
                "pipeline run exceeded its cost ceiling"
            );
        }
    }

    /// Remaining budget, never negative.
    pub fn remaining(&self) -> f64 {
        (self.ceiling - self.committed).max(0.0)
    }

    /// True once no further invocation may be initiated.
    pub fn exhausted(&self) -> bool {
        self.over_budget || self.remaining() <= 0.0
    }

    /// True if a commit ever pushed the total past the ceiling.
    pub fn is_over_budget(&self) -> bool {
        self.over_budget
    }

    /// Total committed so far.
    pub fn total_committed(&self) -> f64 {
        self.committed
    }

    /// The ceiling this run is bounded by.
    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_respects_ceiling() {
        let mut tracker = BudgetTracker::new(0.05);
        assert!(tracker.reserve(0.03));
        tracker.commit(0.03);
        assert!(tracker.reserve(0.02));
        assert!(!tracker.reserve(0.021));
    }

    #[test]
    fn remaining_never_negative() {
        let mut tracker = BudgetTracker::new(0.01);
        tracker.commit(0.05);
        assert_eq!(tracker.remaining(), 0.0);
        assert!(tracker.is_over_budget());
        assert!(tracker.exhausted());
    }

    #[test]
    fn over_budget_commit_succeeds_but_blocks_further_reservations() {
        // Allowed single-invocation overshoot: the estimate fit, the
        // actual cost did not.
        let mut tracker = BudgetTracker::new(0.02);
        assert!(tracker.reserve(0.015));
        tracker.commit(0.03);
        assert_eq!(tracker.total_committed(), 0.03);
        assert!(tracker.is_over_budget());
        assert!(!tracker.reserve(0.0001));
    }

    #[test]
    fn zero_ceiling_rejects_everything() {
        let mut tracker = BudgetTracker::new(0.0);
        assert!(!tracker.reserve(0.0001));
        assert!(tracker.exhausted());
    }

    #[test]
    fn negative_ceiling_clamped_to_zero() {
        let tracker = BudgetTracker::new(-1.0);
        assert_eq!(tracker.ceiling(), 0.0);
        assert!(tracker.exhausted());
    }

    #[test]
    fn exact_fit_reservation_is_allowed() {
        let mut tracker = BudgetTracker::new(0.01);
        assert!(tracker.reserve(0.01));
        tracker.commit(0.01);
        assert!(!tracker.is_over_budget());
        assert!(tracker.exhausted());
    }
}
