//! Deriving replacement invariants from a ratified proposal.
//!
//! Derivation never touches the current invariants; it returns a new value
//! or `None` when the ratified source carries nothing applicable.

use iai_types::{AuthorityDecision, Invariants, ModifiedProposal, ParameterChange, Proposal, ProposedMetric, Verdict};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// How a ratified proposal maps onto invariants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantUpdateMode {
    /// Replace `primary_metric` with the proposed metric.
    #[default]
    PrimaryMetric,
    /// Apply parameter changes to `thresholds`.
    Parametric,
}

impl fmt::Display for InvariantUpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantUpdateMode::PrimaryMetric => write!(f, "primary_metric"),
            InvariantUpdateMode::Parametric => write!(f, "parametric"),
        }
    }
}

/// What a decision ratified.
#[derive(Clone, Copy, Debug)]
pub enum ChangeSource<'a> {
    /// ACCEPT: the Challenger's proposal as submitted.
    Proposal(&'a Proposal),
    /// MODIFY: the Authority's replacement payload.
    Modified(&'a ModifiedProposal),
}

impl<'a> ChangeSource<'a> {
    /// The ratified source, or `None` for REJECT and for MODIFY without an
    /// actionable payload.
    pub fn select(decision: &'a AuthorityDecision, proposal: &'a Proposal) -> Option<Self> {
        match decision.verdict {
            Verdict::Accept => Some(ChangeSource::Proposal(proposal)),
            Verdict::Modify => decision.actionable_modification().map(ChangeSource::Modified),
            Verdict::Reject => None,
        }
    }

    fn metric(&self) -> Option<&'a ProposedMetric> {
        match self {
            ChangeSource::Proposal(p) => p.first_metric(),
            ChangeSource::Modified(m) => m.metric.as_ref(),
        }
    }

    fn parameter_changes(&self) -> BTreeMap<String, ParameterChange> {
        match self {
            ChangeSource::Proposal(p) => p.parameter_changes(),
            ChangeSource::Modified(m) => m.parameter_changes.clone(),
        }
    }
}

/// Build the replacement for `current`, or `None` when nothing would change.
pub fn derive_invariants(
    current: &Invariants,
    source: ChangeSource<'_>,
    mode: InvariantUpdateMode,
    generation: u32,
) -> Option<Invariants> {
    match mode {
        InvariantUpdateMode::PrimaryMetric => {
            let metric = source.metric()?;
            if metric.name == current.primary_metric {
                return None;
            }
            let mut next = current.clone();
            next.primary_metric = metric.name.clone();
            next.metadata.insert(
                "previous_primary_metric".into(),
                Value::from(current.primary_metric.clone()),
            );
            next.metadata.insert("formula".into(), Value::from(metric.formula.clone()));
            next.metadata.insert("rationale".into(), Value::from(metric.rationale.clone()));
            next.metadata.insert("adopted_generation".into(), Value::from(generation));
            Some(next)
        }
        InvariantUpdateMode::Parametric => {
            let mut next = current.clone();
            let mut changed = false;
            for (name, change) in source.parameter_changes() {
                let before = current.threshold(&name);
                // Multiply/Add on an unknown key yields None and is skipped.
                if let Some(after) = change.apply(before) {
                    if before != Some(after) {
                        next.thresholds.insert(name, after);
                        changed = true;
                    }
                }
            }
            if !changed {
                return None;
            }
            next.metadata.insert("adopted_generation".into(), Value::from(generation));
            Some(next)
        }
    }
}
