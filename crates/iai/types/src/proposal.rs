use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::strain::StrainSignals;

/// Severity of a critique, graded by how far a signal overshoots its threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Grade by `value / threshold`: ≥2.0 critical, ≥1.5 high, ≥1.2 medium.
    /// A zero threshold gives no ratio and grades as medium.
    pub fn from_ratio(value: f64, threshold: f64) -> Self {
        if threshold == 0.0 {
            return Severity::Medium;
        }
        let ratio = value / threshold;
        if ratio >= 2.0 {
            Severity::Critical
        } else if ratio >= 1.5 {
            Severity::High
        } else if ratio >= 1.2 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A critique raised against the current invariants.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Critique {
    pub severity: Severity,
    /// Name of the strain signal that triggered this critique.
    pub signal: String,
    pub description: String,
    pub evidence: Map<String, Value>,
}

/// A candidate replacement for the primary metric.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposedMetric {
    pub name: String,
    pub formula: String,
    pub rationale: String,
    pub expected_improvement: String,
}

impl ProposedMetric {
    pub fn new(name: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            formula: formula.into(),
            ..Default::default()
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn with_expected_improvement(mut self, text: impl Into<String>) -> Self {
        self.expected_improvement = text.into();
        self
    }

    /// Lenient read of an untrusted object. Requires a non-empty `name`;
    /// other fields may be strings or numbers and default to empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let name = obj.get("name").and_then(Value::as_str)?.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            formula: text_field(obj, "formula"),
            rationale: text_field(obj, "rationale"),
            expected_improvement: text_field(obj, "expected_improvement"),
        })
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Typed reading of one entry of `proposed_parameter_changes`.
///
/// Wire forms: a bare number (`Set`), or an object tagged by `action`:
/// `{"action":"set","value":v}`, `{"action":"multiply","factor":f}`,
/// `{"action":"add","delta":d}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub enum ParameterChange {
    Set(f64),
    Multiply { factor: f64 },
    Add { delta: f64 },
}

impl ParameterChange {
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(v) = value.as_f64() {
            return v.is_finite().then_some(ParameterChange::Set(v));
        }
        let obj = value.as_object()?;
        let action = obj
            .get("action")
            .and_then(Value::as_str)
            .map(|a| a.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "set".to_string());
        let number = |key: &str| obj.get(key).and_then(Value::as_f64).filter(|v| v.is_finite());
        match action.as_str() {
            "set" => number("value").map(ParameterChange::Set),
            "multiply" => number("factor").map(|factor| ParameterChange::Multiply { factor }),
            "add" => number("delta").map(|delta| ParameterChange::Add { delta }),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ParameterChange::Set(value) => json!({"action": "set", "value": value}),
            ParameterChange::Multiply { factor } => json!({"action": "multiply", "factor": factor}),
            ParameterChange::Add { delta } => json!({"action": "add", "delta": delta}),
        }
    }

    /// New value given the current one. `Multiply` and `Add` need an existing value.
    pub fn apply(&self, current: Option<f64>) -> Option<f64> {
        match (self, current) {
            (ParameterChange::Set(value), _) => Some(*value),
            (ParameterChange::Multiply { factor }, Some(v)) => Some(v * factor),
            (ParameterChange::Add { delta }, Some(v)) => Some(v + delta),
            (_, None) => None,
        }
    }
}

impl From<ParameterChange> for Value {
    fn from(change: ParameterChange) -> Self {
        change.to_value()
    }
}

impl TryFrom<Value> for ParameterChange {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        ParameterChange::from_value(&value)
            .ok_or_else(|| format!("uninterpretable parameter change: {value}"))
    }
}

/// Interpret a raw `name -> change` map, dropping entries that do not parse.
pub fn interpret_parameter_changes(raw: &Map<String, Value>) -> BTreeMap<String, ParameterChange> {
    raw.iter()
        .filter_map(|(name, v)| ParameterChange::from_value(v).map(|c| (name.clone(), c)))
        .collect()
}

/// An advisory proposal produced by a Challenger. Carries no authority.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Proposal {
    pub system_name: String,
    pub strain_signals: StrainSignals,
    pub critiques: Vec<Critique>,
    pub proposed_metrics: Vec<ProposedMetric>,
    pub proposed_parameter_changes: Map<String, Value>,
    pub evidence: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl Proposal {
    pub fn new(system_name: impl Into<String>, strain_signals: StrainSignals) -> Self {
        Self {
            system_name: system_name.into(),
            strain_signals,
            timestamp: Utc::now(),
            ..Default::default()
        }
    }

    /// A proposal recording that nothing was detected.
    pub fn no_strain(system_name: impl Into<String>) -> Self {
        let mut proposal = Self::new(system_name, StrainSignals::new());
        proposal
            .evidence
            .insert("any_strain_detected".into(), Value::Bool(false));
        proposal
            .evidence
            .insert("strain_signal_count".into(), Value::from(0));
        proposal
    }

    pub fn with_critique(mut self, critique: Critique) -> Self {
        self.critiques.push(critique);
        self
    }

    pub fn with_metric(mut self, metric: ProposedMetric) -> Self {
        self.proposed_metrics.push(metric);
        self
    }

    pub fn with_parameter_change(mut self, name: impl Into<String>, change: ParameterChange) -> Self {
        self.proposed_parameter_changes
            .insert(name.into(), change.to_value());
        self
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }

    pub fn has_strain(&self) -> bool {
        self.strain_signals.any_detected()
    }

    pub fn first_metric(&self) -> Option<&ProposedMetric> {
        self.proposed_metrics.first()
    }

    /// Interpretable parameter changes, by name.
    pub fn parameter_changes(&self) -> BTreeMap<String, ParameterChange> {
        interpret_parameter_changes(&self.proposed_parameter_changes)
    }
}
