use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::decision::{AuthorityDecision, Verdict};
use crate::invariants::Invariants;
use crate::proposal::Proposal;
use crate::violation::InvariantViolation;

/// Rationale length kept in the bounded context window.
pub const CONTEXT_RATIONALE_CHARS: usize = 150;

/// Outcome of running one generation under a fixed invariant snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationResult {
    pub generation: u32,
    pub metrics: BTreeMap<String, f64>,
    /// Opaque domain payload handed to the Challenger.
    pub trajectories: Value,
    pub summary: String,
    pub invariants_used: Invariants,
    /// Limits of `invariants_used` that this generation broke.
    pub violations: Vec<InvariantViolation>,
    pub timestamp: DateTime<Utc>,
}

impl GenerationResult {
    pub fn new(generation: u32, invariants_used: Invariants) -> Self {
        Self {
            generation,
            invariants_used,
            timestamp: Utc::now(),
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_trajectories(mut self, trajectories: Value) -> Self {
        self.trajectories = trajectories;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_violation(mut self, violation: InvariantViolation) -> Self {
        self.violations.push(violation);
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn critical_violations(&self) -> impl Iterator<Item = &InvariantViolation> {
        self.violations.iter().filter(|v| v.is_critical())
    }

    /// Value of the primary metric that was active for this generation.
    pub fn primary_value(&self) -> Option<f64> {
        self.metric(&self.invariants_used.primary_metric)
    }

    /// Copy with the trajectory payload dropped.
    pub fn without_trajectories(&self) -> Self {
        Self {
            trajectories: Value::Null,
            ..self.clone()
        }
    }
}

/// One entry of the bounded context window handed to the Authority.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationContext {
    pub generation: u32,
    pub metrics: BTreeMap<String, f64>,
    pub invariants: Invariants,
    /// Types of the limits broken that generation.
    pub violations: Vec<String>,
    pub verdict: Option<Verdict>,
    pub rationale: Option<String>,
}

/// Append-only record of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionHistory {
    pub generations: Vec<GenerationResult>,
    pub proposals: Vec<Proposal>,
    pub decisions: Vec<AuthorityDecision>,
    timeline: Vec<GenerationContext>,
}

impl EvolutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one generation. Trajectories are not retained.
    pub fn add_generation(
        &mut self,
        result: GenerationResult,
        proposal: Proposal,
        decision: Option<AuthorityDecision>,
    ) {
        self.timeline.push(GenerationContext {
            generation: result.generation,
            metrics: result.metrics.clone(),
            invariants: result.invariants_used.clone(),
            violations: result
                .violations
                .iter()
                .map(|v| v.violation_type.clone())
                .collect(),
            verdict: decision.as_ref().map(|d| d.verdict),
            rationale: decision
                .as_ref()
                .map(|d| truncate_chars(&d.rationale, CONTEXT_RATIONALE_CHARS)),
        });
        self.generations.push(result.without_trajectories());
        self.proposals.push(proposal);
        if let Some(decision) = decision {
            self.decisions.push(decision);
        }
    }

    /// The last `n` generations, oldest first.
    pub fn recent_context(&self, n: usize) -> Vec<GenerationContext> {
        let start = self.timeline.len().saturating_sub(n);
        self.timeline[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    pub fn last(&self) -> Option<&GenerationResult> {
        self.generations.last()
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
