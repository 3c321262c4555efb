//! End-to-end test: host cancellation between generations.
//!
//! A stop request is honored only at generation boundaries; the
//! generation in flight completes and is fully persisted.

use crate::support::*;
use async_trait::async_trait;
use iai_authority::{Authority, AuthorityConfig, ScriptedOracle};
use iai_audit::{AuditLog, AuditSink, MemoryAuditSink};
use iai_orchestrator::*;
use iai_types::{GenerationResult, Invariants};
use serde_json::Value;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Requests a stop while running generation `stop_at`.
struct StoppingExecutor {
    inner: ScriptedExecutor,
    stop: StopHandle,
    stop_at: u32,
}

#[async_trait]
impl GenerationExecutor for StoppingExecutor {
    fn default_invariants(&self) -> Invariants {
        self.inner.default_invariants()
    }

    async fn run_baseline(&mut self, params: &Value) -> OrchestratorResult<BaselineResults> {
        self.inner.run_baseline(params).await
    }

    async fn run(
        &mut self,
        generation: u32,
        invariants: &Invariants,
        params: &Value,
    ) -> OrchestratorResult<GenerationResult> {
        if generation == self.stop_at {
            self.stop.stop();
        }
        self.inner.run(generation, invariants, params).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_before_start_runs_nothing() {
    let (mut h, sink) = harness(vec![strained("sharpe"), quiet()], ScriptedOracle::new([accept()])).await;
    h.orchestrator.stop_handle().stop();

    let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.meta_metrics.generations_completed, 0);
    assert!(report.history.is_empty());
    assert!(sink.is_empty());
    assert!(h.store.summary().unwrap().cancelled);
}

#[tokio::test]
async fn stop_during_generation_finishes_it() {
    let stop = StopHandle::new();
    let executor = StoppingExecutor {
        inner: executor(vec![quiet(), strained("sharpe"), strained("sortino")]),
        stop: stop.clone(),
        stop_at: 1,
    };
    let sink = Arc::new(MemoryAuditSink::new());
    let audit = AuditLog::open(sink.clone() as Arc<dyn AuditSink>).await.unwrap();
    let mut orchestrator = Orchestrator::new(
        OrchestratorConfig::default().with_max_generations(3),
        Authority::new(
            AuthorityConfig::default(),
            Arc::new(ScriptedOracle::new([accept(), accept()])),
        ),
        Box::new(executor),
        Box::new(PayloadChallenger),
        audit,
    )
    .with_stop_handle(stop);

    let report = orchestrator.run_evolution(&Value::Null).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.meta_metrics.generations_completed, 2);
    assert_eq!(report.meta_metrics.proposals_accepted, 1);
    assert_eq!(report.final_invariants.primary_metric, "sharpe");
    // Generation 1 wrote its full PROPOSAL / DECISION / INVARIANT_CHANGE triple.
    assert_eq!(sink.len(), 3);
    assert!(report.chain_valid);
}

#[tokio::test]
async fn stop_after_manual_step() {
    let (mut h, _) = harness(vec![quiet(), quiet(), quiet()], ScriptedOracle::new(Vec::<String>::new())).await;
    let handle = h.orchestrator.stop_handle();

    h.orchestrator.step_generation(&Value::Null).await.unwrap();
    handle.stop();
    assert!(h.orchestrator.is_stopped());

    let report = h.orchestrator.run_evolution(&Value::Null).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.meta_metrics.generations_completed, 1);
    assert_eq!(h.store.generations().len(), 1);

    let err = h.orchestrator.step_generation(&Value::Null).await.unwrap_err();
    assert!(format!("{}", err).contains("stopped"));
}
