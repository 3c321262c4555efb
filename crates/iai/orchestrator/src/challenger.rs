//! Challenger boundary: strain detection and advisory proposals.
//!
//! The orchestrator only depends on [`Challenger`]. [`DetectorChallenger`]
//! supplies the generic pipeline (critiques, severity, evidence) around a
//! domain-specific [`StrainDetector`].

use iai_types::{Critique, Proposal, ProposedMetric, Severity, StrainSignals};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Thresholds every detector starts from.
pub const DEFAULT_THRESHOLDS: [(&str, f64); 3] = [
    ("performance_degradation_ratio", 1.2),
    ("variance_spike_ratio", 1.5),
    ("stability_threshold", 0.15),
];

/// Analyses a generation's performance data and proposes changes.
///
/// `analyse` must always return a proposal; "no strain" is a proposal whose
/// signals are all undetected. Results are never cached across generations.
pub trait Challenger: Send + Sync {
    fn analyse(&self, performance_data: &Value, system_name: &str) -> Proposal;

    /// Best performance seen by the baseline comparators.
    fn update_baseline(&mut self, _best_performance: f64) {}
}

/// Domain-specific half of a [`DetectorChallenger`].
pub trait StrainDetector: Send + Sync {
    /// Thresholds layered over [`DEFAULT_THRESHOLDS`].
    fn default_thresholds(&self) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }

    fn detect(
        &self,
        performance_data: &Value,
        thresholds: &BTreeMap<String, f64>,
        baseline: Option<f64>,
    ) -> StrainSignals;

    /// Called only when strain was detected.
    fn propose_alternatives(
        &self,
        signals: &StrainSignals,
        critiques: &[Critique],
    ) -> Vec<ProposedMetric>;

    fn propose_parameter_changes(
        &self,
        _performance_data: &Value,
        _signals: &StrainSignals,
    ) -> Map<String, Value> {
        Map::new()
    }

    fn collect_evidence(&self, _performance_data: &Value, _signals: &StrainSignals) -> Map<String, Value> {
        Map::new()
    }
}

/// Generic challenger pipeline over a [`StrainDetector`].
pub struct DetectorChallenger<D> {
    detector: D,
    thresholds: BTreeMap<String, f64>,
    baseline_performance: Option<f64>,
}

impl<D: StrainDetector> DetectorChallenger<D> {
    pub fn new(detector: D) -> Self {
        let mut thresholds: BTreeMap<String, f64> = DEFAULT_THRESHOLDS
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        thresholds.extend(detector.default_thresholds());
        Self {
            detector,
            thresholds,
            baseline_performance: None,
        }
    }

    pub fn with_thresholds(mut self, overrides: BTreeMap<String, f64>) -> Self {
        self.update_thresholds(overrides);
        self
    }

    pub fn with_baseline(mut self, baseline: f64) -> Self {
        self.baseline_performance = Some(baseline);
        self
    }

    /// Override individual thresholds; others keep their values.
    pub fn update_thresholds(&mut self, overrides: BTreeMap<String, f64>) {
        self.thresholds.extend(overrides);
    }

    pub fn thresholds(&self) -> &BTreeMap<String, f64> {
        &self.thresholds
    }

    pub fn baseline_performance(&self) -> Option<f64> {
        self.baseline_performance
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }
}

/// One critique per detected signal, graded by how far it overshoots.
pub fn critiques_for(signals: &StrainSignals) -> Vec<Critique> {
    signals
        .detected()
        .map(|signal| {
            let mut evidence = Map::new();
            evidence.insert("value".into(), Value::from(signal.value));
            evidence.insert("threshold".into(), Value::from(signal.threshold));
            evidence.insert(
                "ratio".into(),
                signal.ratio().map(Value::from).unwrap_or(Value::Null),
            );
            let description = if signal.description.is_empty() {
                format!("Strain detected: {}", signal.name)
            } else {
                signal.description.clone()
            };
            Critique {
                severity: Severity::from_ratio(signal.value, signal.threshold),
                signal: signal.name.clone(),
                description,
                evidence,
            }
        })
        .collect()
}

impl<D: StrainDetector> Challenger for DetectorChallenger<D> {
    fn analyse(&self, performance_data: &Value, system_name: &str) -> Proposal {
        let signals = self
            .detector
            .detect(performance_data, &self.thresholds, self.baseline_performance);
        let critiques = critiques_for(&signals);

        let proposed_metrics = if signals.any_detected() {
            self.detector.propose_alternatives(&signals, &critiques)
        } else {
            Vec::new()
        };
        let parameter_changes = self
            .detector
            .propose_parameter_changes(performance_data, &signals);

        let mut evidence = self.detector.collect_evidence(performance_data, &signals);
        evidence.insert(
            "strain_signal_count".into(),
            Value::from(signals.count_detected()),
        );
        evidence.insert("any_strain_detected".into(), Value::Bool(signals.any_detected()));

        debug!(
            system = system_name,
            detected = signals.count_detected(),
            alternatives = proposed_metrics.len(),
            "Challenger analysis complete"
        );

        let mut proposal = Proposal::new(system_name, signals);
        proposal.critiques = critiques;
        proposal.proposed_metrics = proposed_metrics;
        proposal.proposed_parameter_changes = parameter_changes;
        proposal.evidence = evidence;
        proposal
    }

    fn update_baseline(&mut self, best_performance: f64) {
        self.baseline_performance = Some(best_performance);
    }
}
