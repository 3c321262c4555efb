//! End-to-end test: a run persisted to disk and resumed.

use crate::support::*;
use iai_audit::{verify_file, AuditLog, AuditSink, FileAuditSink};
use iai_authority::{Authority, AuthorityConfig, RuleOracle, ScriptedOracle};
use iai_orchestrator::*;
use iai_types::{GenerationResult, Invariants, Proposal};
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn run_directory_layout() {
    let dir = tempfile::tempdir().unwrap();
    let run_dir = dir.path().join("runs").join("demo");
    let audit_path = run_dir.join("audit.jsonl");

    let store = Arc::new(FileArtifactStore::new(&run_dir).await.unwrap());
    let sink: Arc<dyn AuditSink> = Arc::new(FileAuditSink::new(&audit_path).await.unwrap());
    let audit = AuditLog::open(sink).await.unwrap();
    let mut orchestrator = Orchestrator::new(
        OrchestratorConfig::default().with_max_generations(3),
        Authority::new(
            AuthorityConfig::default(),
            Arc::new(ScriptedOracle::new([accept(), reject()])),
        ),
        Box::new(executor(vec![quiet(), strained("sharpe"), strained("sortino")])),
        Box::new(PayloadChallenger),
        audit,
    )
    .with_artifact_store(store.clone());

    let report = orchestrator.run_evolution(&json!({"label": "demo"})).await.unwrap();

    for g in 0..3 {
        let gen_dir = run_dir.join(format!("generation_{g:03}"));
        assert!(gen_dir.join("result.json").exists());
        assert!(gen_dir.join("proposal.json").exists());
        assert!(gen_dir.join("invariants.json").exists());
        assert_eq!(gen_dir.join("decision.json").exists(), g > 0);
    }

    let text = std::fs::read_to_string(run_dir.join("generation_001/invariants.json")).unwrap();
    let invariants: Invariants = serde_json::from_str(&text).unwrap();
    assert_eq!(invariants.primary_metric, "sharpe");

    let text = std::fs::read_to_string(run_dir.join("generation_000/proposal.json")).unwrap();
    let proposal: Proposal = serde_json::from_str(&text).unwrap();
    assert!(!proposal.has_strain());

    let text = std::fs::read_to_string(run_dir.join("generation_002/result.json")).unwrap();
    let result: GenerationResult = serde_json::from_str(&text).unwrap();
    assert_eq!(result.invariants_used.primary_metric, "sharpe");

    let config: Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join("config.json")).unwrap()).unwrap();
    assert_eq!(config["params"]["label"], "demo");
    assert_eq!(config["orchestrator"]["max_generations"], 3);

    let summary = load_summary(&run_dir).await.unwrap();
    assert_eq!(summary.meta_metrics, report.meta_metrics);
    assert_eq!(summary.audit_head, report.audit_head);
    assert!(summary.chain_valid);

    let verification = verify_file(&audit_path).await.unwrap();
    assert!(verification.valid);
    assert_eq!(verification.total_entries, 5);
}

#[tokio::test]
async fn resumed_log_extends_the_same_chain() {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");

    let first_head = {
        let sink: Arc<dyn AuditSink> = Arc::new(FileAuditSink::new(&audit_path).await.unwrap());
        let mut h = build(
            vec![strained("sharpe")],
            ScriptedOracle::new([accept()]),
            sink,
            OrchestratorConfig::default(),
        )
        .await;
        h.orchestrator.run_evolution(&Value::Null).await.unwrap().audit_head
    };

    let sink: Arc<dyn AuditSink> = Arc::new(FileAuditSink::new(&audit_path).await.unwrap());
    let audit = AuditLog::open(sink).await.unwrap();
    assert_eq!(audit.entry_count(), 3);
    assert_eq!(audit.head_hash(), first_head);

    // A second run driven by the rule engine keeps appending to the chain.
    let mut orchestrator = Orchestrator::new(
        OrchestratorConfig::default().with_max_generations(1),
        Authority::new(
            AuthorityConfig::default(),
            Arc::new(RuleOracle::new().with_accept_min_signals(1)),
        ),
        Box::new(executor(vec![strained("sortino")])),
        Box::new(PayloadChallenger),
        audit,
    );
    let report = orchestrator.run_evolution(&Value::Null).await.unwrap();
    assert_eq!(report.meta_metrics.proposals_accepted, 1);
    assert_eq!(report.audit_entries, 6);
    assert!(report.chain_valid);

    let lines: Vec<String> = std::fs::read_to_string(&audit_path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    let log = entries(&lines);
    assert_eq!(log[3]["previous_hash"], first_head.as_str());
    assert!(verify_file(&audit_path).await.unwrap().valid);
}

#[tokio::test]
async fn broken_log_cannot_be_resumed() {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    {
        let sink: Arc<dyn AuditSink> = Arc::new(FileAuditSink::new(&audit_path).await.unwrap());
        let mut h = build(
            vec![strained("sharpe")],
            ScriptedOracle::new([reject()]),
            sink,
            OrchestratorConfig::default(),
        )
        .await;
        h.orchestrator.run_evolution(&Value::Null).await.unwrap();
    }

    let text = std::fs::read_to_string(&audit_path).unwrap();
    std::fs::write(&audit_path, text.replacen("REJECT", "ACCEPT", 1)).unwrap();

    let sink = FileAuditSink::new(&audit_path).await.unwrap();
    assert!(AuditLog::open(sink).await.is_err());
}
