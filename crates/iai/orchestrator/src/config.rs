use serde::{Deserialize, Serialize};

use crate::update::InvariantUpdateMode;

fn default_max_generations() -> u32 {
    5
}

fn default_system_name_prefix() -> String {
    "generation".to_string()
}

fn default_higher_is_better() -> bool {
    true
}

/// Evolution loop settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,

    #[serde(default)]
    pub update_mode: InvariantUpdateMode,

    /// Proposals are named `<prefix>_<generation>`
    #[serde(default = "default_system_name_prefix")]
    pub system_name_prefix: String,

    /// Metric compared across an applied change. Falls back to the primary
    /// metric active when the change was applied.
    #[serde(default)]
    pub tracking_metric: Option<String>,

    #[serde(default = "default_higher_is_better")]
    pub higher_is_better: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_generations: default_max_generations(),
            update_mode: InvariantUpdateMode::default(),
            system_name_prefix: default_system_name_prefix(),
            tracking_metric: None,
            higher_is_better: default_higher_is_better(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_generations(mut self, max_generations: u32) -> Self {
        self.max_generations = max_generations;
        self
    }

    pub fn with_update_mode(mut self, mode: InvariantUpdateMode) -> Self {
        self.update_mode = mode;
        self
    }

    pub fn with_tracking_metric(mut self, metric: impl Into<String>) -> Self {
        self.tracking_metric = Some(metric.into());
        self
    }

    pub fn with_higher_is_better(mut self, higher_is_better: bool) -> Self {
        self.higher_is_better = higher_is_better;
        self
    }

    pub fn system_name(&self, generation: u32) -> String {
        format!("{}_{}", self.system_name_prefix, generation)
    }
}
