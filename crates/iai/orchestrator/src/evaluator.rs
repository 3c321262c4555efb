//! External checks of a generation against the limits in its invariants.
//!
//! The evaluator sits outside the learning loop: it reads the metrics a
//! generation reported and the invariants it ran under, and records every
//! broken limit. Violations are evidence for the Authority; they never
//! change invariants on their own.

use iai_types::{GenerationResult, InvariantViolation, Invariants, ViolationSeverity};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error, warn};

const MIN_PREFIX: &str = "min_";
const MAX_PREFIX: &str = "max_";

/// Checks generations for invariant violations.
pub trait Evaluator: Send + Sync {
    /// Violations of `invariants` found in `result`, recorded in the log.
    fn evaluate(&mut self, result: &GenerationResult, invariants: &Invariants) -> Vec<InvariantViolation>;

    /// Every violation recorded so far, oldest first.
    fn violations(&self) -> &[InvariantViolation];
}

/// Enforces `min_<metric>` and `max_<metric>` limits.
///
/// Limits come from the invariants' thresholds and numeric constraints,
/// with constraint overrides set through [`update_constraints`] taking
/// precedence. A limit whose metric the generation did not report is
/// skipped. A reported metric that is not finite is always critical.
///
/// [`update_constraints`]: LimitEvaluator::update_constraints
#[derive(Debug, Default)]
pub struct LimitEvaluator {
    overrides: BTreeMap<String, Value>,
    violations: Vec<InvariantViolation>,
}

impl LimitEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraint(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    /// Merge constraint overrides; later values replace earlier ones.
    pub fn update_constraints(&mut self, constraints: BTreeMap<String, Value>) {
        self.overrides.extend(constraints);
    }

    pub fn log_violation(&mut self, violation: InvariantViolation) {
        self.violations.push(violation);
    }

    pub fn clear_violations(&mut self) {
        self.violations.clear();
    }

    /// Numeric limits in force for `invariants`.
    fn limits(&self, invariants: &Invariants) -> BTreeMap<String, f64> {
        let mut limits = invariants.thresholds.clone();
        for (name, value) in invariants.constraints.iter().chain(&self.overrides) {
            if let Some(limit) = value.as_f64() {
                limits.insert(name.clone(), limit);
            }
        }
        limits
    }

    fn check(&self, result: &GenerationResult, invariants: &Invariants) -> Vec<InvariantViolation> {
        let mut found = Vec::new();

        for (name, value) in &result.metrics {
            if !value.is_finite() {
                found.push(
                    InvariantViolation::new(
                        format!("non_finite_{name}"),
                        format!("{name} is {value}"),
                        ViolationSeverity::Critical,
                    )
                    .with_context("metric", name.as_str()),
                );
            }
        }

        for (name, limit) in self.limits(invariants) {
            let (metric, below_is_bad) = if let Some(metric) = name.strip_prefix(MIN_PREFIX) {
                (metric, true)
            } else if let Some(metric) = name.strip_prefix(MAX_PREFIX) {
                (metric, false)
            } else {
                continue;
            };
            let Some(value) = result.metric(metric).filter(|v| v.is_finite()) else {
                continue;
            };

            let broken = if below_is_bad { value < limit } else { value > limit };
            if !broken {
                continue;
            }
            let relation = if below_is_bad { "below minimum" } else { "above maximum" };
            found.push(
                InvariantViolation::new(
                    name.as_str(),
                    format!("{metric} {value} {relation} {limit}"),
                    ViolationSeverity::from_shortfall(value, limit),
                )
                .with_context("metric", metric)
                .with_context("value", value)
                .with_context("limit", limit)
                .with_context("generation", result.generation),
            );
        }
        found
    }
}

impl Evaluator for LimitEvaluator {
    fn evaluate(&mut self, result: &GenerationResult, invariants: &Invariants) -> Vec<InvariantViolation> {
        let found = self.check(result, invariants);
        if found.is_empty() {
            debug!(generation = result.generation, "Invariant limits hold");
        }
        for violation in &found {
            if violation.is_critical() {
                error!(
                    generation = result.generation,
                    violation = %violation.violation_type,
                    description = %violation.description,
                    "INVARIANT VIOLATION"
                );
            } else {
                warn!(
                    generation = result.generation,
                    violation = %violation.violation_type,
                    severity = %violation.severity,
                    description = %violation.description,
                    "Invariant violation"
                );
            }
            self.log_violation(violation.clone());
        }
        found
    }

    fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }
}
