//! End-to-end test: an audit write failure aborts the generation.
//!
//! No invariant change may exist without its audit trail, so a failing
//! sink must leave invariants, counters and history exactly as they were.

use crate::support::*;
use iai_audit::{AuditError, AuditSink, ChainVerifier};
use iai_authority::ScriptedOracle;
use iai_orchestrator::{OrchestratorConfig, OrchestratorError};
use serde_json::Value;
use std::sync::Arc;

async fn flaky_harness(allowed: usize, oracle: ScriptedOracle) -> (Harness, Arc<FlakySink>) {
    let sink = Arc::new(FlakySink::new(allowed));
    let h = build(
        vec![strained("sharpe"), quiet()],
        oracle,
        sink.clone() as Arc<dyn AuditSink>,
        OrchestratorConfig::default(),
    )
    .await;
    (h, sink)
}

#[tokio::test]
async fn failed_invariant_change_entry_blocks_update() {
    // PROPOSAL and DECISION land; INVARIANT_CHANGE does not.
    let (mut h, sink) = flaky_harness(2, ScriptedOracle::new([accept()])).await;
    let before = h.orchestrator.current_invariants().clone();

    let result = h.orchestrator.step_generation(&Value::Null).await;
    assert!(matches!(
        result,
        Err(OrchestratorError::Audit(AuditError::Unavailable(_)))
    ));

    assert_eq!(h.orchestrator.current_invariants(), &before);
    assert_eq!(h.orchestrator.meta_metrics().generations_completed, 0);
    assert_eq!(h.orchestrator.meta_metrics().proposals_made, 0);
    assert_eq!(h.orchestrator.meta_metrics().proposals_accepted, 0);
    assert!(h.orchestrator.history().is_empty());
    assert_eq!(h.orchestrator.next_generation(), 0);
    assert!(h.store.generations().is_empty());

    // Whatever did land is a whole, valid chain.
    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(ChainVerifier::verify_lines(&lines).valid);
    assert_eq!(h.orchestrator.audit_log().entry_count(), 2);
}

#[tokio::test]
async fn failed_proposal_entry_blocks_even_a_reject() {
    let (mut h, sink) = flaky_harness(0, ScriptedOracle::new([reject()])).await;

    let result = h.orchestrator.step_generation(&Value::Null).await;
    assert!(matches!(result, Err(OrchestratorError::Audit(_))));
    assert_eq!(h.orchestrator.meta_metrics().proposals_rejected, 0);
    assert!(sink.lines().is_empty());
    assert_eq!(h.orchestrator.audit_log().head_hash(), "GENESIS");
}

#[tokio::test]
async fn run_evolution_propagates_audit_failure() {
    let (mut h, _) = flaky_harness(1, ScriptedOracle::new([accept()])).await;

    let result = h.orchestrator.run_evolution(&Value::Null).await;
    assert!(matches!(result, Err(OrchestratorError::Audit(_))));
    assert!(h.store.summary().is_none());
    assert_eq!(h.orchestrator.current_invariants().primary_metric, DEFAULT_METRIC);
}

#[tokio::test]
async fn quiet_generation_needs_no_audit_sink() {
    let sink = Arc::new(FlakySink::new(0));
    let mut h = build(
        vec![quiet(), quiet()],
        ScriptedOracle::new(Vec::<String>::new()),
        sink.clone() as Arc<dyn AuditSink>,
        OrchestratorConfig::default(),
    )
    .await;

    let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();
    assert_eq!(report.meta_metrics.generations_completed, 2);
    assert_eq!(report.audit_entries, 0);
    assert!(report.chain_valid);
}
