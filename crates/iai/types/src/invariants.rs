use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The invariant configuration active for a generation.
///
/// Exactly one `Invariants` value is current at any instant. It is replaced
/// wholesale after an Authority decision is applied, never edited in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Invariants {
    /// Name of the authoritative success signal.
    pub primary_metric: String,
    /// Named numeric limits.
    pub thresholds: BTreeMap<String, f64>,
    /// Named limits and flags of any shape.
    pub constraints: BTreeMap<String, Value>,
    /// Free-form provenance (formula, rationale, adopting generation...).
    pub metadata: BTreeMap<String, Value>,
}

impl Invariants {
    pub fn new(primary_metric: impl Into<String>) -> Self {
        Self {
            primary_metric: primary_metric.into(),
            ..Default::default()
        }
    }

    pub fn with_threshold(mut self, name: impl Into<String>, value: f64) -> Self {
        self.thresholds.insert(name.into(), value);
        self
    }

    pub fn with_constraint(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraints.insert(name.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn threshold(&self, name: &str) -> Option<f64> {
        self.thresholds.get(name).copied()
    }
}
