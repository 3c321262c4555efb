use chrono::{DateTime, Utc};
use iai_types::{EvolutionHistory, Invariants};
use serde::{Deserialize, Serialize};

use crate::executor::BaselineResults;
use crate::metrics::MetaMetrics;

/// Everything a finished (or cancelled) run produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub meta_metrics: MetaMetrics,
    pub final_invariants: Invariants,
    pub baseline: BaselineResults,
    pub history: EvolutionHistory,
    /// Hash of the last audit entry, `GENESIS` if none was written.
    pub audit_head: String,
    pub audit_entries: u64,
    pub chain_valid: bool,
    /// Index of the first entry that failed verification.
    pub chain_first_invalid_index: Option<usize>,
    pub chain_failure: Option<String>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            meta_metrics: self.meta_metrics.clone(),
            final_invariants: self.final_invariants.clone(),
            baseline_results: self.baseline.clone(),
            audit_head: self.audit_head.clone(),
            audit_entries: self.audit_entries,
            chain_valid: self.chain_valid,
            chain_first_invalid_index: self.chain_first_invalid_index,
            chain_failure: self.chain_failure.clone(),
            cancelled: self.cancelled,
            timestamp: Utc::now(),
        }
    }
}

/// Run-level summary written once at the end of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSummary {
    pub meta_metrics: MetaMetrics,
    pub final_invariants: Invariants,
    pub baseline_results: BaselineResults,
    pub audit_head: String,
    pub audit_entries: u64,
    pub chain_valid: bool,
    pub chain_first_invalid_index: Option<usize>,
    pub chain_failure: Option<String>,
    pub cancelled: bool,
    pub timestamp: DateTime<Utc>,
}
