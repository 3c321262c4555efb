use chrono::{DateTime, Utc};
use iai_types::{AuthorityDecision, EvolutionHistory, FailureKind, GenerationResult, Invariants, Proposal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AuthorityConfig;
use crate::context::ReviewContext;
use crate::oracle::DecisionOracle;
use crate::parser::parse_decision;

/// One review as the Authority saw it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub generation: u32,
    pub context: ReviewContext,
    /// `None` when the oracle produced no response.
    pub raw_response: Option<String>,
    pub decision: AuthorityDecision,
    pub timestamp: DateTime<Utc>,
    pub oracle: String,
}

/// The only component allowed to ratify an invariant change.
///
/// Judgment is delegated to a [`DecisionOracle`]; every oracle failure,
/// timeout or malformed answer becomes a REJECT with zero confidence.
/// `review_proposal` never returns an error.
pub struct Authority {
    config: AuthorityConfig,
    oracle: Arc<dyn DecisionOracle>,
    decision_history: Vec<DecisionRecord>,
}

impl Authority {
    pub fn new(config: AuthorityConfig, oracle: Arc<dyn DecisionOracle>) -> Self {
        info!(
            oracle = oracle.identifier(),
            strictness = %config.strictness,
            timeout_ms = config.oracle_timeout_ms,
            "Authority ready"
        );
        Self {
            config,
            oracle,
            decision_history: Vec::new(),
        }
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    pub fn oracle_identifier(&self) -> &str {
        self.oracle.identifier()
    }

    /// Every review performed so far, oldest first.
    pub fn decision_history(&self) -> &[DecisionRecord] {
        &self.decision_history
    }

    /// Review `proposal` against the current generation's metrics and
    /// violations.
    pub async fn review_proposal(
        &mut self,
        proposal: &Proposal,
        current: &GenerationResult,
        baseline_metrics: &BTreeMap<String, f64>,
        current_invariants: &Invariants,
        generation: u32,
        evolution_history: &EvolutionHistory,
    ) -> AuthorityDecision {
        let window = evolution_history.recent_context(self.config.history_window);
        let context = ReviewContext::new(
            generation,
            self.config.strictness,
            self.config.domain_context.clone(),
            current_invariants.clone(),
            current.metrics.clone(),
            baseline_metrics.clone(),
            proposal.clone(),
            window,
        )
        .with_violations(current.violations.clone());
        debug!(
            generation,
            history = context.evolution_history.len(),
            prompt_chars = context.prompt.len(),
            "Review context built"
        );

        let oracle_id = self.oracle.identifier().to_string();
        let timeout = self.config.oracle_timeout();

        let (raw_response, decision) =
            match tokio::time::timeout(timeout, self.oracle.decide(&context)).await {
                Err(_) => (
                    None,
                    AuthorityDecision::fail_closed(
                        FailureKind::OracleTimeout,
                        format!("no response within {}ms", self.config.oracle_timeout_ms),
                        &oracle_id,
                    ),
                ),
                Ok(Err(e)) => (
                    None,
                    AuthorityDecision::fail_closed(e.failure_kind(), e.to_string(), &oracle_id),
                ),
                Ok(Ok(raw)) => {
                    let decision = parse_decision(&raw, &oracle_id).into_decision(&oracle_id);
                    (Some(raw), decision)
                }
            };

        match decision.failure {
            Some(kind) => warn!(
                generation,
                oracle = %oracle_id,
                failure = %kind,
                rationale = %decision.rationale,
                "Authority fell back to REJECT"
            ),
            None => info!(
                generation,
                oracle = %oracle_id,
                verdict = %decision.verdict,
                confidence = decision.confidence,
                "Authority decision"
            ),
        }

        self.decision_history.push(DecisionRecord {
            generation,
            context,
            raw_response,
            decision: decision.clone(),
            timestamp: Utc::now(),
            oracle: oracle_id,
        });

        decision
    }
}
