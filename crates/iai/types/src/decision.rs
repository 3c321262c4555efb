use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::proposal::{interpret_parameter_changes, ParameterChange, ProposedMetric};

/// The Authority's verdict on a proposal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Accept,
    #[default]
    Reject,
    Modify,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accept => "ACCEPT",
            Verdict::Reject => "REJECT",
            Verdict::Modify => "MODIFY",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACCEPT" => Ok(Verdict::Accept),
            "REJECT" => Ok(Verdict::Reject),
            "MODIFY" => Ok(Verdict::Modify),
            other => Err(format!("unknown verdict: {other}")),
        }
    }
}

/// Why a decision was produced by the fail-closed fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    OracleUnavailable,
    OracleTimeout,
    ParseError,
    InvalidVerdict,
}

impl FailureKind {
    /// Stable concern string recorded on fallback decisions.
    pub fn concern(&self) -> &'static str {
        match self {
            FailureKind::OracleUnavailable => "oracle unavailable",
            FailureKind::OracleTimeout => "oracle timeout",
            FailureKind::ParseError => "parse error",
            FailureKind::InvalidVerdict => "invalid verdict",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.concern())
    }
}

/// Typed form of a MODIFY payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifiedProposal {
    pub metric: Option<ProposedMetric>,
    pub parameter_changes: BTreeMap<String, ParameterChange>,
    /// The payload exactly as the oracle sent it.
    pub raw: Value,
}

impl ModifiedProposal {
    pub fn with_metric(metric: ProposedMetric) -> Self {
        Self {
            metric: Some(metric),
            ..Default::default()
        }
    }

    pub fn with_parameter_changes(changes: BTreeMap<String, ParameterChange>) -> Self {
        Self {
            parameter_changes: changes,
            ..Default::default()
        }
    }

    /// Read an untrusted payload. `null` yields `None`; anything else yields a
    /// value that may or may not be actionable.
    ///
    /// The metric is looked up under `proposed_metrics[0]`, `proposed_metric`,
    /// the payload itself (when it has a `name`), or a bare `primary_metric`
    /// string. Parameter changes come from `proposed_parameter_changes` or
    /// `parameter_changes`.
    pub fn from_value(value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        let Some(obj) = value.as_object() else {
            return Some(Self {
                raw: value.clone(),
                ..Default::default()
            });
        };

        let metric = obj
            .get("proposed_metrics")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(ProposedMetric::from_value)
            .or_else(|| obj.get("proposed_metric").and_then(ProposedMetric::from_value))
            .or_else(|| ProposedMetric::from_value(value))
            .or_else(|| {
                obj.get("primary_metric")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(|name| ProposedMetric::new(name, ""))
            });

        let parameter_changes = obj
            .get("proposed_parameter_changes")
            .or_else(|| obj.get("parameter_changes"))
            .and_then(Value::as_object)
            .map(interpret_parameter_changes)
            .unwrap_or_default();

        Some(Self {
            metric,
            parameter_changes,
            raw: value.clone(),
        })
    }

    /// True when the payload carries something that can change invariants.
    pub fn is_actionable(&self) -> bool {
        self.metric.is_some() || !self.parameter_changes.is_empty()
    }
}

/// The Authority's decision on one proposal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorityDecision {
    pub decision_id: Uuid,
    pub verdict: Verdict,
    pub rationale: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub concerns: Vec<String>,
    /// Present only when `verdict` is MODIFY.
    pub modified_proposal: Option<ModifiedProposal>,
    pub timestamp: DateTime<Utc>,
    /// Identifier of the oracle that produced the judgment.
    pub decided_by: String,
    /// Set when this decision came from the fail-closed fallback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl AuthorityDecision {
    fn base(verdict: Verdict, rationale: impl Into<String>, confidence: f64) -> Self {
        Self {
            decision_id: Uuid::new_v4(),
            verdict,
            rationale: rationale.into(),
            confidence: clamp_confidence(confidence),
            timestamp: Utc::now(),
            ..Default::default()
        }
    }

    pub fn accept(rationale: impl Into<String>, confidence: f64) -> Self {
        Self::base(Verdict::Accept, rationale, confidence)
    }

    pub fn reject(rationale: impl Into<String>, confidence: f64) -> Self {
        Self::base(Verdict::Reject, rationale, confidence)
    }

    pub fn modify(
        rationale: impl Into<String>,
        confidence: f64,
        modified: Option<ModifiedProposal>,
    ) -> Self {
        let mut decision = Self::base(Verdict::Modify, rationale, confidence);
        decision.modified_proposal = modified;
        decision
    }

    /// The safe fallback: REJECT, zero confidence, concern naming the failure.
    pub fn fail_closed(
        kind: FailureKind,
        detail: impl Into<String>,
        decided_by: impl Into<String>,
    ) -> Self {
        let detail = detail.into();
        let rationale = if detail.is_empty() {
            format!("Fail-closed: {}", kind.concern())
        } else {
            format!("Fail-closed: {}: {}", kind.concern(), detail)
        };
        let mut decision = Self::base(Verdict::Reject, rationale, 0.0);
        decision.concerns.push(kind.concern().to_string());
        decision.decided_by = decided_by.into();
        decision.failure = Some(kind);
        decision
    }

    pub fn with_concern(mut self, concern: impl Into<String>) -> Self {
        self.concerns.push(concern.into());
        self
    }

    pub fn with_decided_by(mut self, decided_by: impl Into<String>) -> Self {
        self.decided_by = decided_by.into();
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }

    /// The actionable MODIFY payload, if any.
    pub fn actionable_modification(&self) -> Option<&ModifiedProposal> {
        match self.verdict {
            Verdict::Modify => self
                .modified_proposal
                .as_ref()
                .filter(|m| m.is_actionable()),
            _ => None,
        }
    }

    /// Whether this decision permits an invariant change at all.
    /// MODIFY without an actionable payload has the effect of REJECT.
    pub fn effective_change(&self) -> bool {
        match self.verdict {
            Verdict::Accept => true,
            Verdict::Modify => self.actionable_modification().is_some(),
            Verdict::Reject => false,
        }
    }
}

/// Clamp to `[0, 1]`; NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
