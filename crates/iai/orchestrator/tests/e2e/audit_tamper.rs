//! End-to-end test: post-hoc edits to a persisted audit log are detected.

use crate::support::*;
use iai_audit::{verify_file, AuditEventType, AuditLog, AuditSink, FileAuditSink};
use iai_authority::ScriptedOracle;
use iai_orchestrator::OrchestratorConfig;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn note(text: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("note".into(), Value::from(text));
    data
}

/// Write entries A, B, C and return the file contents.
async fn write_abc(path: &Path) -> String {
    let sink = FileAuditSink::new(path).await.unwrap();
    let mut log = AuditLog::open(sink).await.unwrap();
    for text in ["alpha", "bravo", "charlie"] {
        log.log(AuditEventType::Proposal, note(text), Map::new())
            .await
            .unwrap();
    }
    std::fs::read_to_string(path).unwrap()
}

fn rewrite(path: &Path, lines: &[String]) {
    let mut text = lines.join("\n");
    text.push('\n');
    std::fs::write(path, text).unwrap();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn editing_b_data_breaks_the_chain_at_b() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let original = write_abc(&path).await;
    assert!(verify_file(&path).await.unwrap().valid);

    let mut lines: Vec<String> = original.lines().map(str::to_string).collect();
    assert!(lines[1].contains("bravo"));
    lines[1] = lines[1].replace("bravo", "bravp");
    rewrite(&path, &lines);

    let verification = verify_file(&path).await.unwrap();
    assert!(!verification.valid);
    assert_eq!(verification.first_invalid_index, Some(1));
    assert_eq!(verification.verified_entries, 1);
    assert!(verification.reason.is_some());
}

#[tokio::test]
async fn deleting_or_reordering_entries_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let original = write_abc(&path).await;
    let lines: Vec<String> = original.lines().map(str::to_string).collect();

    rewrite(&path, &[lines[0].clone(), lines[2].clone()]);
    let deleted = verify_file(&path).await.unwrap();
    assert!(!deleted.valid);
    assert_eq!(deleted.first_invalid_index, Some(1));

    rewrite(&path, &[lines[0].clone(), lines[2].clone(), lines[1].clone()]);
    let reordered = verify_file(&path).await.unwrap();
    assert!(!reordered.valid);
    assert_eq!(reordered.first_invalid_index, Some(1));
}

#[tokio::test]
async fn verify_is_idempotent_and_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let original = write_abc(&path).await;

    for _ in 0..3 {
        let verification = verify_file(&path).await.unwrap();
        assert!(verification.valid);
        assert_eq!(verification.total_entries, 3);
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
}

#[tokio::test]
async fn any_character_edit_of_a_run_log_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run").join("audit.jsonl");
    let sink: Arc<dyn AuditSink> = Arc::new(FileAuditSink::new(&path).await.unwrap());
    let mut h = build(
        vec![quiet(), strained("sharpe"), strained("sortino")],
        ScriptedOracle::new([accept(), reject()]),
        sink,
        OrchestratorConfig::default(),
    )
    .await;
    let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();
    assert!(report.chain_valid);

    let original = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<String> = original.lines().map(str::to_string).collect();
    assert_eq!(lines.len(), 5);

    for (index, line) in lines.iter().enumerate() {
        let bytes = line.as_bytes();
        for pos in (0..bytes.len()).step_by(13) {
            let replacement = if bytes[pos] == b'a' { 'b' } else { 'a' };
            let mut edited: String = line[..pos].to_string();
            edited.push(replacement);
            edited.push_str(&line[pos + 1..]);

            let mut tampered = lines.clone();
            tampered[index] = edited;
            rewrite(&path, &tampered);

            let verification = verify_file(&path).await.unwrap();
            assert!(!verification.valid, "edit at line {index} byte {pos} went unnoticed");
            let at = verification.first_invalid_index.unwrap();
            assert!(at == index || at == index + 1);
        }
    }

    std::fs::write(&path, &original).unwrap();
    assert!(verify_file(&path).await.unwrap().valid);
}

#[tokio::test]
async fn tampering_during_a_run_is_reported_with_its_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let sink: Arc<dyn AuditSink> = Arc::new(FileAuditSink::new(&path).await.unwrap());
    let mut h = build(
        vec![strained("sharpe"), quiet(), strained("sortino")],
        ScriptedOracle::new([accept(), reject()]),
        sink,
        OrchestratorConfig::default(),
    )
    .await;

    h.orchestrator.step_generation(&Value::Null).await.unwrap();
    let mut lines: Vec<String> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(r#""verdict":"ACCEPT""#));
    lines[1] = lines[1].replace(r#""verdict":"ACCEPT""#, r#""verdict":"REJECT""#);
    rewrite(&path, &lines);

    let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();
    assert!(!report.chain_valid);
    assert_eq!(report.chain_first_invalid_index, Some(1));
    assert!(report.chain_failure.is_some());

    let summary = h.store.summary().unwrap();
    assert!(!summary.chain_valid);
    assert_eq!(summary.chain_first_invalid_index, Some(1));
    assert_eq!(summary.chain_failure, report.chain_failure);
}
