//! End-to-end test: the canonical quiet / accept / reject run.
//!
//! Generation 0 sees no strain, generation 1 is accepted and swaps the
//! primary metric, generation 2 is rejected and leaves it alone.

use crate::support::*;
use iai_authority::ScriptedOracle;
use iai_orchestrator::GenerationOutcome;
use iai_types::Verdict;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn payloads() -> Vec<Value> {
    vec![quiet(), strained("sharpe"), strained("sortino")]
}

fn oracle() -> ScriptedOracle {
    ScriptedOracle::new([accept(), reject()])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn meta_metrics_match_scenario() {
    let (mut h, _) = harness(payloads(), oracle()).await;
    let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();

    let m = &report.meta_metrics;
    assert_eq!(m.proposals_made, 2);
    assert_eq!(m.proposals_accepted, 1);
    assert_eq!(m.proposals_rejected, 1);
    assert_eq!(m.proposals_modified, 0);
    assert_eq!(m.generations_completed, 3);
    assert!(m.is_consistent());
    assert!(!report.cancelled);
}

#[tokio::test]
async fn invariants_follow_verdicts() {
    let (mut h, _) = harness(payloads(), oracle()).await;
    let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();

    let used: Vec<&str> = report
        .history
        .generations
        .iter()
        .map(|g| g.invariants_used.primary_metric.as_str())
        .collect();
    assert_eq!(used, vec![DEFAULT_METRIC, DEFAULT_METRIC, "sharpe"]);
    assert_eq!(report.final_invariants.primary_metric, "sharpe");
    assert_eq!(report.final_invariants.metadata["adopted_generation"], 1);
    // Thresholds survive a primary-metric swap.
    assert_eq!(report.final_invariants.threshold("kelly_fraction"), Some(0.5));
}

#[tokio::test]
async fn step_outcomes_in_order() {
    let (mut h, _) = harness(payloads(), oracle()).await;
    let o = &mut h.orchestrator;

    assert_eq!(o.step_generation(&Value::Null).await.unwrap(), GenerationOutcome::NoStrain);
    assert_eq!(
        o.step_generation(&Value::Null).await.unwrap(),
        GenerationOutcome::Reviewed {
            verdict: Verdict::Accept,
            applied: true
        }
    );
    let after_accept = o.current_invariants().clone();
    assert_eq!(
        o.step_generation(&Value::Null).await.unwrap(),
        GenerationOutcome::Reviewed {
            verdict: Verdict::Reject,
            applied: false
        }
    );
    assert_eq!(o.current_invariants(), &after_accept);
}

#[tokio::test]
async fn history_records_every_generation() {
    let (mut h, _) = harness(payloads(), oracle()).await;
    let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();

    assert_eq!(report.history.generations.len(), 3);
    assert_eq!(report.history.proposals.len(), 3);
    assert_eq!(report.history.decisions.len(), 2);
    assert!(!report.history.proposals[0].has_strain());
    assert!(report.history.generations.iter().all(|g| g.trajectories.is_null()));

    let window = report.history.recent_context(10);
    assert_eq!(window[0].verdict, None);
    assert_eq!(window[1].verdict, Some(Verdict::Accept));
    assert_eq!(window[2].verdict, Some(Verdict::Reject));

    // The Authority saw the accepted generation in its context for the next review.
    let records = h.orchestrator.authority().decision_history();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].context.evolution_history.len(), 2);
    assert_eq!(records[1].context.current_invariants.primary_metric, "sharpe");
    assert_eq!(records[1].context.baseline_metrics["best_performance"], 10.0);
}

#[tokio::test]
async fn audit_trail_links_proposal_decision_change() {
    let (mut h, sink) = harness(payloads(), oracle()).await;
    let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();
    assert!(report.chain_valid);
    assert_eq!(report.audit_entries, 5);

    let log = entries(&sink.lines());
    let kinds: Vec<&str> = log.iter().map(|e| e["event_type"].as_str().unwrap()).collect();
    assert_eq!(
        kinds,
        vec!["PROPOSAL", "DECISION", "INVARIANT_CHANGE", "PROPOSAL", "DECISION"]
    );

    assert_eq!(log[0]["previous_hash"], "GENESIS");
    assert_eq!(log[1]["data"]["proposal_hash"], log[0]["hash"]);
    assert_eq!(log[2]["data"]["decision_hash"], log[1]["hash"]);
    assert_eq!(log[4]["data"]["proposal_hash"], log[3]["hash"]);
    assert_eq!(log[2]["data"]["new_invariants"]["primary_metric"], "sharpe");
    assert_eq!(log[4]["metadata"]["verdict"], "REJECT");
    assert_eq!(log[4]["hash"], report.audit_head.as_str());
    for (i, entry) in log.iter().enumerate() {
        assert_eq!(entry["entry_id"], i as u64);
        assert_eq!(entry["data"]["generation"], if i < 3 { 1 } else { 2 });
    }
}

#[tokio::test]
async fn artifacts_per_generation() {
    let (mut h, _) = harness(payloads(), oracle()).await;
    let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();

    let gens = h.store.generations();
    assert_eq!(gens.len(), 3);
    assert!(gens[0].decision.is_none());
    assert_eq!(gens[1].decision.as_ref().unwrap().verdict, Verdict::Accept);
    assert_eq!(gens[1].invariants.primary_metric, "sharpe");
    assert_eq!(gens[2].invariants.primary_metric, "sharpe");

    let summary = h.store.summary().unwrap();
    assert_eq!(summary.meta_metrics, report.meta_metrics);
    assert_eq!(summary.final_invariants, report.final_invariants);
    assert_eq!(summary.baseline_results.best_performance(), Some(10.0));
    assert!(h.store.config().is_some());
}
