use iai_types::{GenerationContext, Invariants, InvariantViolation, Proposal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::Strictness;
use crate::prompt::PromptBuilder;

/// Everything a decision oracle sees for one review.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewContext {
    pub generation: u32,
    pub strictness: Strictness,
    pub domain_context: String,
    pub current_invariants: Invariants,
    pub current_metrics: BTreeMap<String, f64>,
    pub baseline_metrics: BTreeMap<String, f64>,
    /// Limits the current generation broke.
    #[serde(default)]
    pub violations: Vec<InvariantViolation>,
    pub proposal: Proposal,
    /// Bounded window of recent generations, oldest first.
    pub evolution_history: Vec<GenerationContext>,
    /// Rendered prompt for text-based oracles.
    pub prompt: String,
}

impl ReviewContext {
    /// Assemble a context and render its prompt.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        generation: u32,
        strictness: Strictness,
        domain_context: impl Into<String>,
        current_invariants: Invariants,
        current_metrics: BTreeMap<String, f64>,
        baseline_metrics: BTreeMap<String, f64>,
        proposal: Proposal,
        evolution_history: Vec<GenerationContext>,
    ) -> Self {
        let mut context = Self {
            generation,
            strictness,
            domain_context: domain_context.into(),
            current_invariants,
            current_metrics,
            baseline_metrics,
            violations: Vec::new(),
            proposal,
            evolution_history,
            prompt: String::new(),
        };
        context.prompt = PromptBuilder::build_review_prompt(&context);
        context
    }

    /// Attach the current generation's violations and re-render the prompt.
    pub fn with_violations(mut self, violations: Vec<InvariantViolation>) -> Self {
        self.violations = violations;
        self.prompt = PromptBuilder::build_review_prompt(&self);
        self
    }
}
