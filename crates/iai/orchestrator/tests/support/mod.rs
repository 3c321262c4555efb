//! Shared fixtures for the orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use iai_audit::{AuditError, AuditLog, AuditResult, AuditSink, MemoryAuditSink};
use iai_authority::{Authority, AuthorityConfig, DecisionOracle};
use iai_orchestrator::*;
use iai_types::{Invariants, ParameterChange, Proposal, ProposedMetric, StrainSignal, StrainSignals};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DEFAULT_METRIC: &str = "reward";

// ---------------------------------------------------------------------------
// Trajectory payloads
// ---------------------------------------------------------------------------

/// A generation with nothing to report.
pub fn quiet() -> Value {
    json!({ "strain": false })
}

/// A strained generation whose proposal suggests `metric`.
pub fn strained(metric: &str) -> Value {
    json!({ "strain": true, "metric": metric })
}

/// A strained generation proposing only a parameter change.
pub fn strained_parametric(name: &str, change: ParameterChange) -> Value {
    let mut changes = serde_json::Map::new();
    changes.insert(name.to_string(), change.to_value());
    json!({ "strain": true, "changes": changes })
}

// ---------------------------------------------------------------------------
// Challenger
// ---------------------------------------------------------------------------

/// Builds proposals straight from the trajectory payload.
pub struct PayloadChallenger;

impl Challenger for PayloadChallenger {
    fn analyse(&self, data: &Value, system_name: &str) -> Proposal {
        let strained = data["strain"].as_bool().unwrap_or(false);
        if !strained {
            return Proposal::no_strain(system_name);
        }
        let signals = StrainSignals::new().with(StrainSignal::new("payload", true, 2.0, 1.0));
        let mut proposal = Proposal::new(system_name, signals);
        proposal.critiques = critiques_for(&proposal.strain_signals);
        if let Some(metric) = data["metric"].as_str() {
            proposal = proposal.with_metric(ProposedMetric::new(metric, format!("f({metric})")));
        }
        if let Some(changes) = data["changes"].as_object() {
            proposal.proposed_parameter_changes = changes.clone();
        }
        proposal
    }
}

// ---------------------------------------------------------------------------
// Audit sinks
// ---------------------------------------------------------------------------

/// Accepts `allowed` appends, then reports the store unavailable.
pub struct FlakySink {
    inner: MemoryAuditSink,
    allowed: usize,
    appended: AtomicUsize,
}

impl FlakySink {
    pub fn new(allowed: usize) -> Self {
        Self {
            inner: MemoryAuditSink::new(),
            allowed,
            appended: AtomicUsize::new(0),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.inner.lines()
    }
}

#[async_trait]
impl AuditSink for FlakySink {
    async fn append_line(&self, line: &str) -> AuditResult<()> {
        if self.appended.load(Ordering::SeqCst) >= self.allowed {
            return Err(AuditError::Unavailable("simulated disk full".into()));
        }
        self.inner.append_line(line).await?;
        self.appended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_lines(&self) -> AuditResult<Vec<String>> {
        self.inner.read_lines().await
    }
}

// ---------------------------------------------------------------------------
// Orchestrator assembly
// ---------------------------------------------------------------------------

/// Executor replaying `payloads`; generation `g` reports `reward = g`.
pub fn executor(payloads: Vec<Value>) -> ScriptedExecutor {
    let mut executor = ScriptedExecutor::new(
        Invariants::new(DEFAULT_METRIC).with_threshold("kelly_fraction", 0.5),
    )
    .with_baseline(BaselineResults::new().with_summary_metric(BEST_PERFORMANCE, 10.0));
    for (g, payload) in payloads.into_iter().enumerate() {
        executor = executor.with_generation(
            ScriptedGeneration::new(payload).with_metric(DEFAULT_METRIC, g as f64),
        );
    }
    executor
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub store: Arc<MemoryArtifactStore>,
}

pub async fn build(
    payloads: Vec<Value>,
    oracle: impl DecisionOracle + 'static,
    sink: Arc<dyn AuditSink>,
    config: OrchestratorConfig,
) -> Harness {
    let store = Arc::new(MemoryArtifactStore::new());
    let audit = AuditLog::open(sink).await.unwrap();
    let orchestrator = Orchestrator::new(
        config.with_max_generations(payloads.len() as u32),
        Authority::new(AuthorityConfig::default(), Arc::new(oracle)),
        Box::new(executor(payloads)),
        Box::new(PayloadChallenger),
        audit,
    )
    .with_artifact_store(store.clone());
    Harness { orchestrator, store }
}

/// Harness over an in-memory audit sink with default settings.
pub async fn harness(
    payloads: Vec<Value>,
    oracle: impl DecisionOracle + 'static,
) -> (Harness, Arc<MemoryAuditSink>) {
    let sink = Arc::new(MemoryAuditSink::new());
    let harness = build(payloads, oracle, sink.clone(), OrchestratorConfig::default()).await;
    (harness, sink)
}

pub fn accept() -> String {
    r#"{"verdict":"ACCEPT","rationale":"evidence is solid","confidence":0.85,"concerns":[]}"#.into()
}

pub fn reject() -> String {
    r#"{"verdict":"REJECT","rationale":"not convinced","confidence":0.7,"concerns":["noise"]}"#.into()
}

pub fn modify_to(metric: &str) -> String {
    format!(
        r#"{{"verdict":"MODIFY","rationale":"narrower","confidence":0.6,"modified_proposal":{{"primary_metric":"{metric}"}}}}"#
    )
}

pub fn modify_without_payload() -> String {
    r#"{"verdict":"MODIFY","rationale":"something else","confidence":0.6}"#.into()
}

/// Parse every stored audit line.
pub fn entries(lines: &[String]) -> Vec<Value> {
    lines
        .iter()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}
