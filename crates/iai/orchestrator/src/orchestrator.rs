use iai_audit::{AuditLog, AuditSink};
use iai_authority::Authority;
use iai_types::{AuthorityDecision, EvolutionHistory, GenerationResult, Invariants, Proposal, Verdict};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::artifacts::{ArtifactStore, GenerationArtifacts, MemoryArtifactStore};
use crate::challenger::Challenger;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::evaluator::{Evaluator, LimitEvaluator};
use crate::executor::{BaselineResults, GenerationExecutor};
use crate::metrics::MetaMetrics;
use crate::report::RunReport;
use crate::update::{derive_invariants, ChangeSource};

/// Host-side cancellation flag, honored between generations.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a single generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationOutcome {
    /// Nothing detected; review skipped.
    NoStrain,
    /// The Authority ruled. `applied` is true when the invariants changed.
    Reviewed { verdict: Verdict, applied: bool },
}

/// Tracking value captured in the generation a change was applied.
#[derive(Clone, Debug)]
struct PendingChange {
    metric: String,
    value: f64,
}

/// The evolution state machine.
///
/// Owns the current invariants, the history, the counters and the audit
/// writer. Invariants are replaced only after the audit log has accepted
/// the PROPOSAL, DECISION and INVARIANT_CHANGE entries that justify it.
pub struct Orchestrator {
    config: OrchestratorConfig,
    authority: Authority,
    executor: Box<dyn GenerationExecutor>,
    challenger: Box<dyn Challenger>,
    evaluator: Box<dyn Evaluator>,
    audit: AuditLog<Arc<dyn AuditSink>>,
    artifacts: Arc<dyn ArtifactStore>,
    current_invariants: Invariants,
    history: EvolutionHistory,
    baseline: Option<BaselineResults>,
    metrics: MetaMetrics,
    stop: StopHandle,
    pending_change: Option<PendingChange>,
    next_generation: u32,
}

impl Orchestrator {
    /// Initial state: the executor's default invariants, empty history,
    /// zeroed counters.
    pub fn new(
        config: OrchestratorConfig,
        authority: Authority,
        executor: Box<dyn GenerationExecutor>,
        challenger: Box<dyn Challenger>,
        audit: AuditLog<Arc<dyn AuditSink>>,
    ) -> Self {
        let current_invariants = executor.default_invariants();
        info!(
            max_generations = config.max_generations,
            update_mode = %config.update_mode,
            oracle = authority.oracle_identifier(),
            primary_metric = %current_invariants.primary_metric,
            "Orchestrator initialized"
        );
        Self {
            config,
            authority,
            executor,
            challenger,
            evaluator: Box::new(LimitEvaluator::new()),
            audit,
            artifacts: Arc::new(MemoryArtifactStore::new()),
            current_invariants,
            history: EvolutionHistory::new(),
            baseline: None,
            metrics: MetaMetrics::new(),
            stop: StopHandle::new(),
            pending_change: None,
            next_generation: 0,
        }
    }

    pub fn with_artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = store;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn current_invariants(&self) -> &Invariants {
        &self.current_invariants
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    pub fn meta_metrics(&self) -> &MetaMetrics {
        &self.metrics
    }

    pub fn baseline(&self) -> Option<&BaselineResults> {
        self.baseline.as_ref()
    }

    pub fn evaluator(&self) -> &dyn Evaluator {
        self.evaluator.as_ref()
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn audit_log(&self) -> &AuditLog<Arc<dyn AuditSink>> {
        &self.audit
    }

    /// Index of the generation `step_generation` runs next.
    pub fn next_generation(&self) -> u32 {
        self.next_generation
    }

    /// Run the baseline comparators once and seed the challenger.
    async fn ensure_baseline(&mut self, params: &Value) -> OrchestratorResult<()> {
        if self.baseline.is_some() {
            return Ok(());
        }
        let baseline = self.executor.run_baseline(params).await?;
        if let Some(best) = baseline.best_performance() {
            self.challenger.update_baseline(best);
        }
        info!(metrics = baseline.summary.len(), "Baseline complete");

        let config = json!({
            "orchestrator": self.config,
            "authority": self.authority.config(),
            "oracle": self.authority.oracle_identifier(),
            "initial_invariants": self.current_invariants,
            "params": params,
        });
        self.artifacts.save_config(&config).await?;
        self.baseline = Some(baseline);
        Ok(())
    }

    /// Execute one generation: RUN, CHALLENGE and, under strain, REVIEW
    /// and UPDATE-OR-REJECT.
    ///
    /// An audit write failure aborts the generation before anything is
    /// installed or counted.
    pub async fn step_generation(&mut self, params: &Value) -> OrchestratorResult<GenerationOutcome> {
        if self.is_stopped() {
            return Err(OrchestratorError::Stopped);
        }
        if self.next_generation >= self.config.max_generations {
            return Err(OrchestratorError::MaxGenerationsReached(self.config.max_generations));
        }
        self.ensure_baseline(params).await?;

        let generation = self.next_generation;
        info!(
            generation,
            primary_metric = %self.current_invariants.primary_metric,
            "Generation started"
        );

        // RUN
        let mut result = self
            .executor
            .run(generation, &self.current_invariants, params)
            .await?;
        let violations = self.evaluator.evaluate(&result, &self.current_invariants);
        result.violations.extend(violations);

        let change_effect = self.pending_change.as_ref().and_then(|pending| {
            result
                .metric(&pending.metric)
                .map(|after| (pending.value, after))
        });

        // CHALLENGE
        let system_name = self.config.system_name(generation);
        let proposal = self.challenger.analyse(&result.trajectories, &system_name);

        if !proposal.has_strain() {
            info!(generation, "No strain, continuing");
            self.commit_effect(change_effect);
            self.pending_change = None;
            self.metrics.record_generation();
            self.metrics.record_violations(result.violations.len());
            self.finish_generation(result, proposal, None).await?;
            return Ok(GenerationOutcome::NoStrain);
        }

        // REVIEW
        let baseline_metrics = self
            .baseline
            .as_ref()
            .map(|b| b.summary.clone())
            .unwrap_or_default();
        let decision = self
            .authority
            .review_proposal(
                &proposal,
                &result,
                &baseline_metrics,
                &self.current_invariants,
                generation,
                &self.history,
            )
            .await;
        log_decision_summary(generation, &decision);

        // PERSIST to the audit log before touching state.
        let proposal_hash = self.audit.log_proposal(generation, &proposal).await?;
        let decision_hash = self
            .audit
            .log_decision(generation, &decision, &proposal_hash)
            .await?;

        let replacement = ChangeSource::select(&decision, &proposal).and_then(|source| {
            derive_invariants(
                &self.current_invariants,
                source,
                self.config.update_mode,
                generation,
            )
        });
        if let Some(next) = &replacement {
            self.audit
                .log_invariant_change(generation, &self.current_invariants, next, &decision_hash)
                .await?;
        }

        // UPDATE-OR-REJECT
        let applied = replacement.is_some();
        match (decision.verdict, decision.effective_change(), applied) {
            (Verdict::Modify, false, _) => warn!(
                generation,
                "MODIFY without an actionable payload; invariants unchanged"
            ),
            (_, true, false) => warn!(
                generation,
                update_mode = %self.config.update_mode,
                "Ratified proposal carries no applicable change; invariants unchanged"
            ),
            _ => {}
        }

        self.commit_effect(change_effect);
        self.pending_change = None;
        if let Some(next) = replacement {
            let tracking = self
                .config
                .tracking_metric
                .clone()
                .unwrap_or_else(|| self.current_invariants.primary_metric.clone());
            self.pending_change = result.metric(&tracking).map(|value| PendingChange {
                metric: tracking,
                value,
            });
            let old = std::mem::replace(&mut self.current_invariants, next);
            info!(
                generation,
                from = %old.primary_metric,
                to = %self.current_invariants.primary_metric,
                "Invariants updated"
            );
        } else {
            info!(generation, "Continuing with current invariants");
        }

        self.metrics.record_review(decision.verdict, decision.effective_change());
        self.metrics.record_generation();
        self.metrics.record_violations(result.violations.len());

        let verdict = decision.verdict;
        self.finish_generation(result, proposal, Some(decision)).await?;
        Ok(GenerationOutcome::Reviewed { verdict, applied })
    }

    fn commit_effect(&mut self, effect: Option<(f64, f64)>) {
        if let Some((before, after)) = effect {
            self.metrics
                .record_change_effect(before, after, self.config.higher_is_better);
        }
    }

    /// Append to history, then write artifacts.
    async fn finish_generation(
        &mut self,
        result: GenerationResult,
        proposal: Proposal,
        decision: Option<AuthorityDecision>,
    ) -> OrchestratorResult<()> {
        let generation = result.generation;
        let artifacts = GenerationArtifacts {
            generation,
            result: result.without_trajectories(),
            proposal: proposal.clone(),
            decision: decision.clone(),
            invariants: self.current_invariants.clone(),
        };
        self.history.add_generation(result, proposal, decision);
        self.next_generation = generation + 1;
        self.artifacts.save_generation(&artifacts).await
    }

    /// Drive generations until `max_generations` or a host stop, then
    /// verify the audit chain and write the run summary.
    pub async fn run_evolution(&mut self, params: &Value) -> OrchestratorResult<RunReport> {
        info!(max_generations = self.config.max_generations, "Starting evolution");
        self.ensure_baseline(params).await?;

        let mut cancelled = false;
        while self.next_generation < self.config.max_generations {
            if self.is_stopped() {
                info!(generation = self.next_generation, "Evolution cancelled by host");
                cancelled = true;
                break;
            }
            self.step_generation(params).await?;
        }

        let verification = self.audit.verify_chain().await?;
        if !verification.valid {
            warn!(
                index = ?verification.first_invalid_index,
                reason = ?verification.reason,
                "Audit chain failed verification"
            );
        }

        let report = RunReport {
            meta_metrics: self.metrics.clone(),
            final_invariants: self.current_invariants.clone(),
            baseline: self.baseline.clone().unwrap_or_default(),
            history: self.history.clone(),
            audit_head: self.audit.head_hash().to_string(),
            audit_entries: self.audit.entry_count(),
            chain_valid: verification.valid,
            chain_first_invalid_index: verification.first_invalid_index,
            chain_failure: verification.reason.clone(),
            cancelled,
        };
        self.artifacts.save_summary(&report.summary()).await?;

        info!(
            generations = self.metrics.generations_completed,
            proposals = self.metrics.proposals_made,
            accepted = self.metrics.proposals_accepted,
            modified = self.metrics.proposals_modified,
            rejected = self.metrics.proposals_rejected,
            chain_valid = verification.valid,
            "Evolution complete"
        );
        Ok(report)
    }
}

fn log_decision_summary(generation: u32, decision: &AuthorityDecision) {
    info!(
        generation,
        verdict = %decision.verdict,
        confidence = decision.confidence,
        rationale = %decision.rationale,
        concerns = %decision.concerns.join(", "),
        decided_by = %decision.decided_by,
        "Authority decision"
    );
}
