use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// How badly a generation missed an invariant limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    Warning,
    #[default]
    Error,
    Critical,
}

impl ViolationSeverity {
    /// Grade a miss by its distance from the limit, relative to the limit.
    /// A zero limit grades as `Error`.
    pub fn from_shortfall(value: f64, limit: f64) -> Self {
        if limit == 0.0 {
            return ViolationSeverity::Error;
        }
        let miss = ((value - limit) / limit).abs();
        if miss >= 0.5 {
            ViolationSeverity::Critical
        } else if miss >= 0.1 {
            ViolationSeverity::Error
        } else {
            ViolationSeverity::Warning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationSeverity::Warning => "warning",
            ViolationSeverity::Error => "error",
            ViolationSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A limit from the current invariants that a generation's metrics broke.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Name of the broken limit, e.g. `min_episodes`.
    pub violation_type: String,
    pub description: String,
    pub severity: ViolationSeverity,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl InvariantViolation {
    pub fn new(
        violation_type: impl Into<String>,
        description: impl Into<String>,
        severity: ViolationSeverity,
    ) -> Self {
        Self {
            violation_type: violation_type.into(),
            description: description.into(),
            severity,
            context: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == ViolationSeverity::Critical
    }
}
