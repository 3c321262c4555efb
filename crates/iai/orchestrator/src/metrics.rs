use iai_types::Verdict;
use serde::{Deserialize, Serialize};

/// Running counters summarising an evolution run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaMetrics {
    /// Generations with detected strain that went to review.
    pub proposals_made: u64,
    pub proposals_accepted: u64,
    /// REJECT, and MODIFY without an actionable payload.
    pub proposals_rejected: u64,
    pub proposals_modified: u64,
    /// Every completed generation, strained or not.
    pub generations_completed: u64,
    /// Changes followed by a better tracking metric next generation.
    pub improvements_after_change: u64,
    /// Changes followed by a worse tracking metric next generation.
    pub regressions_after_change: u64,
    /// Invariant limits broken across all generations.
    pub invariant_violations: u64,
}

impl MetaMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_generation(&mut self) {
        self.generations_completed += 1;
    }

    pub fn record_violations(&mut self, count: usize) {
        self.invariant_violations += count as u64;
    }

    /// Count one reviewed proposal by its effect.
    pub fn record_review(&mut self, verdict: Verdict, effective: bool) {
        self.proposals_made += 1;
        match (verdict, effective) {
            (Verdict::Accept, _) => self.proposals_accepted += 1,
            (Verdict::Modify, true) => self.proposals_modified += 1,
            _ => self.proposals_rejected += 1,
        }
    }

    /// Compare the tracking metric before and after an applied change.
    /// Equal values count as neither.
    pub fn record_change_effect(&mut self, before: f64, after: f64, higher_is_better: bool) {
        let improved = if higher_is_better { after > before } else { after < before };
        let regressed = if higher_is_better { after < before } else { after > before };
        if improved {
            self.improvements_after_change += 1;
        } else if regressed {
            self.regressions_after_change += 1;
        }
    }

    /// Every reviewed proposal landed in exactly one outcome bucket.
    pub fn is_consistent(&self) -> bool {
        self.proposals_made
            == self.proposals_accepted + self.proposals_modified + self.proposals_rejected
    }

    pub fn acceptance_rate(&self) -> f64 {
        if self.proposals_made == 0 {
            return 0.0;
        }
        (self.proposals_accepted + self.proposals_modified) as f64 / self.proposals_made as f64
    }
}
