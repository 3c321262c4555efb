//! Subcommand implementations

use anyhow::Context;
use iai_audit::{verify_file, AuditLog, AuditSink, ChainVerification, FileAuditSink};
use iai_authority::{Authority, DecisionOracle, HttpOracle, RuleOracle};
use iai_orchestrator::{
    load_summary, DetectorChallenger, FileArtifactStore, Orchestrator, RunReport, RunSummary,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{IaiConfig, OracleKind};
use crate::workload::{DriftingWorkload, WorkloadDetector};

const DOMAIN_CONTEXT: &str = "A synthetic episodic workload whose reward level drifts downward \
and whose noise grows every generation. The primary metric is the objective the workload \
optimises; thresholds hold tunable policy parameters such as exploration_rate.";

fn build_oracle(config: &IaiConfig) -> anyhow::Result<Arc<dyn DecisionOracle>> {
    Ok(match config.oracle.kind {
        OracleKind::Rule => Arc::new(
            RuleOracle::new().with_accept_min_signals(config.oracle.accept_min_signals),
        ),
        OracleKind::Http => Arc::new(
            HttpOracle::new(config.oracle.http.clone()).context("Failed to build HTTP oracle")?,
        ),
    })
}

/// Run a configured evolution over the synthetic workload.
pub async fn run(config: IaiConfig) -> anyhow::Result<RunReport> {
    let output_dir = config.run.output_dir.clone();
    let audit_path = config.audit.resolve(&output_dir);

    let mut authority_config = config.authority.clone();
    if authority_config.domain_context.is_empty() {
        authority_config.domain_context = DOMAIN_CONTEXT.to_string();
    }
    let authority = Authority::new(authority_config, build_oracle(&config)?);

    let store = FileArtifactStore::new(&output_dir)
        .await
        .with_context(|| format!("Cannot prepare run directory {}", output_dir.display()))?;
    let sink: Arc<dyn AuditSink> = Arc::new(
        FileAuditSink::new(&audit_path)
            .await
            .with_context(|| format!("Cannot open audit log {}", audit_path.display()))?,
    );
    let audit = AuditLog::open(sink)
        .await
        .with_context(|| format!("Refusing to extend audit log {}", audit_path.display()))?;

    let mut orchestrator = Orchestrator::new(
        config.run.orchestrator_config(),
        authority,
        Box::new(DriftingWorkload::new(config.run.workload.clone())),
        Box::new(DetectorChallenger::new(WorkloadDetector)),
        audit,
    )
    .with_artifact_store(Arc::new(store));

    let stop = orchestrator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stop requested, finishing the current generation");
            stop.stop();
        }
    });

    info!(
        output_dir = %output_dir.display(),
        audit = %audit_path.display(),
        oracle = %orchestrator.authority().oracle_identifier(),
        "Starting evolution"
    );
    let report = orchestrator.run_evolution(&config.run.params).await?;
    print_summary(&report.summary());
    Ok(report)
}

/// Verify an audit log. Returns the verification so the caller picks the exit code.
pub async fn verify(path: &Path) -> anyhow::Result<ChainVerification> {
    let verification = verify_file(path)
        .await
        .with_context(|| format!("Cannot read audit log {}", path.display()))?;

    if verification.valid {
        println!(
            "✓ Audit chain intact: {} entries ({})",
            verification.total_entries,
            path.display()
        );
    } else {
        eprintln!(
            "✗ Audit chain broken at entry {}: {}",
            verification
                .first_invalid_index
                .map_or_else(|| "?".to_string(), |i| i.to_string()),
            verification.reason.as_deref().unwrap_or("unknown")
        );
        eprintln!(
            "  {} of {} entries verified",
            verification.verified_entries, verification.total_entries
        );
    }
    Ok(verification)
}

/// Print the summary stored in a run directory.
pub async fn summary(run_dir: &Path, json: bool) -> anyhow::Result<RunSummary> {
    let summary = load_summary(run_dir)
        .await
        .with_context(|| format!("No run summary in {}", run_dir.display()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    let m = &summary.meta_metrics;
    println!();
    println!("Evolution summary{}", if summary.cancelled { " (cancelled)" } else { "" });
    println!("  Generations completed: {}", m.generations_completed);
    println!(
        "  Proposals: {} made, {} accepted, {} modified, {} rejected",
        m.proposals_made, m.proposals_accepted, m.proposals_modified, m.proposals_rejected
    );
    println!("  Acceptance rate: {:.1}%", m.acceptance_rate() * 100.0);
    println!(
        "  After changes: {} improved, {} regressed",
        m.improvements_after_change, m.regressions_after_change
    );
    println!("  Invariant violations: {}", m.invariant_violations);
    println!("  Primary metric: {}", summary.final_invariants.primary_metric);
    for (name, value) in &summary.final_invariants.thresholds {
        println!("  Threshold {}: {}", name, value);
    }
    println!(
        "  Audit: {} entries, head {}, chain {}",
        summary.audit_entries,
        summary.audit_head,
        if summary.chain_valid { "valid" } else { "BROKEN" }
    );
    if let Some(index) = summary.chain_first_invalid_index {
        println!(
            "  First invalid entry: {} ({})",
            index,
            summary.chain_failure.as_deref().unwrap_or("unknown")
        );
    }
}
