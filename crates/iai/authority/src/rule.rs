use async_trait::async_trait;
use iai_types::{ParameterChange, Severity};
use serde_json::{json, Map, Value};

use crate::config::Strictness;
use crate::context::ReviewContext;
use crate::error::OracleResult;
use crate::oracle::DecisionOracle;

/// Deterministic rule engine standing in for a human or LLM reviewer.
///
/// - The evidence bar is met when at least `accept_min_signals` strain
///   signals fired (one under `Permissive`); `Strict` additionally requires
///   a high or critical critique.
/// - Bar met with a proposed metric: ACCEPT.
/// - Bar met with only parameter changes: MODIFY with half-step changes.
/// - Otherwise: REJECT.
///
/// Emits the same JSON an LLM is asked for, so its output goes through the
/// normal parser.
pub struct RuleOracle {
    identifier: String,
    accept_min_signals: usize,
}

impl RuleOracle {
    pub fn new() -> Self {
        Self {
            identifier: "rule-oracle".into(),
            accept_min_signals: 2,
        }
    }

    pub fn with_accept_min_signals(mut self, n: usize) -> Self {
        self.accept_min_signals = n.max(1);
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    fn judge(&self, context: &ReviewContext) -> Value {
        let strictness = context.strictness;
        let proposal = &context.proposal;
        let detected = proposal.strain_signals.count_detected();
        let worst = proposal.critiques.iter().map(|c| c.severity).max();

        let min_signals = match strictness {
            Strictness::Permissive => 1,
            _ => self.accept_min_signals,
        };
        let severe_enough = match strictness {
            Strictness::Strict => worst.is_some_and(|s| s >= Severity::High),
            _ => true,
        };

        if detected < min_signals || !severe_enough {
            return json!({
                "verdict": "REJECT",
                "rationale": format!(
                    "{detected} strain signal(s) detected; {strictness} review needs at least {min_signals}{}",
                    if strictness == Strictness::Strict { " with a high or critical critique" } else { "" }
                ),
                "confidence": 0.6,
                "concerns": ["insufficient evidence"],
                "modified_proposal": Value::Null,
            });
        }

        let confidence = match worst.unwrap_or_default() {
            Severity::Critical => 0.9,
            Severity::High => 0.8,
            Severity::Medium => 0.7,
            Severity::Low => 0.6,
        };

        if let Some(metric) = proposal.first_metric() {
            return json!({
                "verdict": "ACCEPT",
                "rationale": format!(
                    "{detected} strain signal(s) support replacing '{}' with '{}'",
                    context.current_invariants.primary_metric, metric.name
                ),
                "confidence": confidence,
                "concerns": [],
                "modified_proposal": Value::Null,
            });
        }

        let changes = proposal.parameter_changes();
        if !changes.is_empty() {
            let mut damped = Map::new();
            for (name, change) in changes {
                damped.insert(name, half_step(change).to_value());
            }
            return json!({
                "verdict": "MODIFY",
                "rationale": "Adopting the parameter direction at half the proposed step",
                "confidence": confidence,
                "concerns": ["step size"],
                "modified_proposal": { "proposed_parameter_changes": damped },
            });
        }

        json!({
            "verdict": "REJECT",
            "rationale": "Strain detected but the proposal offers no actionable alternative",
            "confidence": 0.7,
            "concerns": ["no alternative proposed"],
            "modified_proposal": Value::Null,
        })
    }
}

impl Default for RuleOracle {
    fn default() -> Self {
        Self::new()
    }
}

fn half_step(change: ParameterChange) -> ParameterChange {
    match change {
        ParameterChange::Set(v) => ParameterChange::Set(v),
        ParameterChange::Multiply { factor } => ParameterChange::Multiply {
            factor: 1.0 + (factor - 1.0) / 2.0,
        },
        ParameterChange::Add { delta } => ParameterChange::Add { delta: delta / 2.0 },
    }
}

#[async_trait]
impl DecisionOracle for RuleOracle {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn decide(&self, context: &ReviewContext) -> OracleResult<String> {
        Ok(self.judge(context).to_string())
    }
}
