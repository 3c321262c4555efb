//! Generation executor boundary.

use async_trait::async_trait;
use iai_types::{GenerationResult, Invariants};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Summary key the challenger baseline is read from.
pub const BEST_PERFORMANCE: &str = "best_performance";

/// Output of the baseline comparators run once before generation 0.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineResults {
    /// Named numbers handed to the Authority as `baseline_metrics`.
    pub summary: BTreeMap<String, f64>,
    /// Free-form domain detail, persisted with the run summary.
    pub details: Value,
}

impl BaselineResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summary_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.summary.insert(name.into(), value);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn best_performance(&self) -> Option<f64> {
        self.summary.get(BEST_PERFORMANCE).copied()
    }
}

/// Runs the domain system. The only expensive step of a generation.
#[async_trait]
pub trait GenerationExecutor: Send + Sync {
    fn default_invariants(&self) -> Invariants;

    async fn run_baseline(&mut self, params: &Value) -> OrchestratorResult<BaselineResults>;

    async fn run(
        &mut self,
        generation: u32,
        invariants: &Invariants,
        params: &Value,
    ) -> OrchestratorResult<GenerationResult>;
}

/// One canned generation for [`ScriptedExecutor`].
#[derive(Clone, Debug, Default)]
pub struct ScriptedGeneration {
    pub metrics: BTreeMap<String, f64>,
    pub trajectories: Value,
}

impl ScriptedGeneration {
    pub fn new(trajectories: Value) -> Self {
        Self {
            trajectories,
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// Executor that replays canned generations in order.
pub struct ScriptedExecutor {
    defaults: Invariants,
    baseline: BaselineResults,
    script: VecDeque<ScriptedGeneration>,
}

impl ScriptedExecutor {
    pub fn new(defaults: Invariants) -> Self {
        Self {
            defaults,
            baseline: BaselineResults::default(),
            script: VecDeque::new(),
        }
    }

    pub fn with_baseline(mut self, baseline: BaselineResults) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_generation(mut self, generation: ScriptedGeneration) -> Self {
        self.script.push_back(generation);
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

#[async_trait]
impl GenerationExecutor for ScriptedExecutor {
    fn default_invariants(&self) -> Invariants {
        self.defaults.clone()
    }

    async fn run_baseline(&mut self, _params: &Value) -> OrchestratorResult<BaselineResults> {
        Ok(self.baseline.clone())
    }

    async fn run(
        &mut self,
        generation: u32,
        invariants: &Invariants,
        _params: &Value,
    ) -> OrchestratorResult<GenerationResult> {
        let next = self
            .script
            .pop_front()
            .ok_or_else(|| OrchestratorError::Executor(format!("no script for generation {generation}")))?;

        let mut result = GenerationResult::new(generation, invariants.clone())
            .with_trajectories(next.trajectories)
            .with_summary(format!("scripted generation {generation}"));
        result.metrics = next.metrics;
        Ok(result)
    }
}
