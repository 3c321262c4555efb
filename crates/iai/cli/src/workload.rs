//! Synthetic drifting workload driven by `iai run`.
//!
//! Each generation plays a fixed number of episodes whose reward level
//! decays with the generation number while the noise grows, so a naive
//! `mean_reward` objective eventually strains. The adopted invariants feed
//! back into the workload: a risk-aware primary metric and a lower
//! `exploration_rate` both damp the noise. All noise is a deterministic
//! function of the seed, the generation and the episode index.

use async_trait::async_trait;
use iai_orchestrator::{
    BaselineResults, GenerationExecutor, OrchestratorResult, StrainDetector, BEST_PERFORMANCE,
};
use iai_types::{Critique, GenerationResult, Invariants, ParameterChange, ProposedMetric, StrainSignal, StrainSignals};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub const MEAN_REWARD: &str = "mean_reward";
pub const REWARD_STD: &str = "reward_std";
pub const RISK_ADJUSTED_REWARD: &str = "risk_adjusted_reward";
pub const P10_REWARD: &str = "p10_reward";
pub const EXPLORATION_RATE: &str = "exploration_rate";
pub const EPISODES: &str = "episodes";
pub const MIN_EPISODES: &str = "min_episodes";

const DEFAULT_EXPLORATION_RATE: f64 = 0.3;

/// Shape of the synthetic workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Episodes per generation
    #[serde(default = "default_episodes")]
    pub episodes: usize,

    /// Reward level at generation 0
    #[serde(default = "default_base_reward")]
    pub base_reward: f64,

    /// Fraction of the reward level lost per generation
    #[serde(default = "default_drift")]
    pub drift_per_generation: f64,

    /// Noise amplitude at generation 0
    #[serde(default = "default_noise")]
    pub noise: f64,

    /// Relative noise growth per generation
    #[serde(default = "default_noise_growth")]
    pub noise_growth: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            base_reward: default_base_reward(),
            drift_per_generation: default_drift(),
            noise: default_noise(),
            noise_growth: default_noise_growth(),
            seed: default_seed(),
        }
    }
}

fn default_episodes() -> usize {
    32
}

fn default_base_reward() -> f64 {
    10.0
}

fn default_drift() -> f64 {
    0.08
}

fn default_noise() -> f64 {
    1.0
}

fn default_noise_growth() -> f64 {
    0.35
}

fn default_seed() -> u64 {
    7
}

/// splitmix64 step mapped onto [-1, 1].
fn pseudo_noise(seed: u64, generation: u32, episode: usize) -> f64 {
    let mut z = seed
        .wrapping_add((generation as u64) << 32)
        .wrapping_add(episode as u64)
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Summary statistics of one batch of episode rewards.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeStats {
    pub mean: f64,
    pub std: f64,
    pub p10: f64,
    pub first_half_std: f64,
    pub second_half_std: f64,
}

impl EpisodeStats {
    pub fn from_rewards(rewards: &[f64]) -> Self {
        let (first, second) = rewards.split_at(rewards.len() / 2);
        Self {
            mean: mean(rewards),
            std: std_dev(rewards),
            p10: percentile(rewards, 0.1),
            first_half_std: std_dev(first),
            second_half_std: std_dev(second),
        }
    }

    pub fn risk_adjusted(&self) -> f64 {
        if self.std > f64::EPSILON {
            self.mean / self.std
        } else {
            self.mean
        }
    }
}

/// [`GenerationExecutor`] over the synthetic workload.
pub struct DriftingWorkload {
    config: WorkloadConfig,
}

impl DriftingWorkload {
    pub fn new(config: WorkloadConfig) -> Self {
        Self { config }
    }

    fn episodes(&self, params: &Value) -> usize {
        params
            .get("episodes")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.config.episodes)
            .max(1)
    }

    /// Episode rewards for one generation under the given invariants.
    pub fn play(&self, generation: u32, invariants: &Invariants, episodes: usize) -> Vec<f64> {
        let c = &self.config;
        let g = generation as f64;
        let level = c.base_reward * (1.0 - c.drift_per_generation * g).max(0.1);

        let exploration = invariants
            .threshold(EXPLORATION_RATE)
            .unwrap_or(DEFAULT_EXPLORATION_RATE)
            .max(0.0);
        let mut amplitude = c.noise * (1.0 + c.noise_growth * g) * exploration / DEFAULT_EXPLORATION_RATE;
        if matches!(invariants.primary_metric.as_str(), RISK_ADJUSTED_REWARD | P10_REWARD) {
            amplitude *= 0.6;
        }

        (0..episodes)
            .map(|i| {
                // Noise ramps up within a generation.
                let ramp = if i < episodes / 2 { 1.0 } else { 1.0 + c.noise_growth };
                level + amplitude * ramp * pseudo_noise(c.seed, generation, i)
            })
            .collect()
    }
}

#[async_trait]
impl GenerationExecutor for DriftingWorkload {
    fn default_invariants(&self) -> Invariants {
        Invariants::new(MEAN_REWARD)
            .with_threshold(EXPLORATION_RATE, DEFAULT_EXPLORATION_RATE)
            .with_constraint(MIN_EPISODES, 2)
    }

    async fn run_baseline(&mut self, params: &Value) -> OrchestratorResult<BaselineResults> {
        // Comparators: the workload without drift, and a fixed-policy run.
        let episodes = self.episodes(params);
        let c = &self.config;
        let steady: Vec<f64> = (0..episodes)
            .map(|i| c.base_reward + c.noise * pseudo_noise(c.seed ^ 0xBA5E, 0, i))
            .collect();
        let fixed: Vec<f64> = (0..episodes)
            .map(|i| 0.8 * c.base_reward + 0.5 * c.noise * pseudo_noise(c.seed ^ 0xF1C5, 0, i))
            .collect();

        let steady = EpisodeStats::from_rewards(&steady);
        let fixed = EpisodeStats::from_rewards(&fixed);
        let best = steady.mean.max(fixed.mean);

        Ok(BaselineResults::new()
            .with_summary_metric(BEST_PERFORMANCE, best)
            .with_summary_metric("steady_mean_reward", steady.mean)
            .with_summary_metric("fixed_policy_mean_reward", fixed.mean)
            .with_details(json!({
                "episodes": episodes,
                "steady": {"mean": steady.mean, "std": steady.std},
                "fixed_policy": {"mean": fixed.mean, "std": fixed.std},
            })))
    }

    async fn run(
        &mut self,
        generation: u32,
        invariants: &Invariants,
        params: &Value,
    ) -> OrchestratorResult<GenerationResult> {
        let episodes = self.episodes(params);
        let rewards = self.play(generation, invariants, episodes);
        let stats = EpisodeStats::from_rewards(&rewards);

        Ok(GenerationResult::new(generation, invariants.clone())
            .with_metric(MEAN_REWARD, stats.mean)
            .with_metric(REWARD_STD, stats.std)
            .with_metric(RISK_ADJUSTED_REWARD, stats.risk_adjusted())
            .with_metric(P10_REWARD, stats.p10)
            .with_metric(EPISODES, episodes as f64)
            .with_trajectories(json!({
                "episode_rewards": rewards,
                "mean_reward": stats.mean,
                "reward_std": stats.std,
                "first_half_std": stats.first_half_std,
                "second_half_std": stats.second_half_std,
            }))
            .with_summary(format!(
                "{} episodes, mean {:.3}, std {:.3}",
                episodes, stats.mean, stats.std
            )))
    }
}

/// Strain heuristics for [`DriftingWorkload`] trajectories.
pub struct WorkloadDetector;

impl StrainDetector for WorkloadDetector {
    fn detect(
        &self,
        data: &Value,
        thresholds: &BTreeMap<String, f64>,
        baseline: Option<f64>,
    ) -> StrainSignals {
        let threshold = |name: &str| thresholds.get(name).copied().unwrap_or(0.0);
        let mean = data["mean_reward"].as_f64().unwrap_or(0.0);
        let std = data["reward_std"].as_f64().unwrap_or(0.0);
        let first = data["first_half_std"].as_f64().unwrap_or(0.0);
        let second = data["second_half_std"].as_f64().unwrap_or(0.0);

        let mut signals = StrainSignals::new();

        let limit = threshold("performance_degradation_ratio");
        let degradation = match baseline {
            Some(best) => best / mean.abs().max(1e-6),
            None => 1.0,
        };
        signals.insert(
            StrainSignal::new(
                "performance_degradation",
                baseline.is_some() && degradation > limit,
                degradation,
                limit,
            )
            .with_description("reward fell well below the baseline comparators"),
        );

        let limit = threshold("stability_threshold");
        let cv = std / mean.abs().max(1e-6);
        signals.insert(
            StrainSignal::new("instability", cv > limit, cv, limit)
                .with_description("reward spread is large relative to its level"),
        );

        let limit = threshold("variance_spike_ratio");
        let spike = if first > f64::EPSILON { second / first } else { 1.0 };
        signals.insert(
            StrainSignal::new("variance_spike", spike > limit, spike, limit)
                .with_description("reward variance spiked within the generation"),
        );

        signals
    }

    fn propose_alternatives(&self, signals: &StrainSignals, critiques: &[Critique]) -> Vec<ProposedMetric> {
        let detected = |name: &str| signals.get(name).is_some_and(|s| s.detected);
        let mut metrics = Vec::new();

        if detected("instability") || detected("variance_spike") {
            metrics.push(
                ProposedMetric::new(RISK_ADJUSTED_REWARD, "mean_reward / reward_std")
                    .with_rationale(format!(
                        "{} critiques point at unstable returns; rewarding consistency damps the spread",
                        critiques.len()
                    ))
                    .with_expected_improvement("lower reward variance at similar mean"),
            );
        }
        if detected("performance_degradation") {
            metrics.push(
                ProposedMetric::new(P10_REWARD, "10th percentile of episode rewards")
                    .with_rationale("optimising the tail protects against the worst episodes")
                    .with_expected_improvement("fewer collapsed episodes"),
            );
        }
        metrics
    }

    fn propose_parameter_changes(&self, _data: &Value, signals: &StrainSignals) -> Map<String, Value> {
        let mut changes = Map::new();
        if signals.get("variance_spike").is_some_and(|s| s.detected) {
            changes.insert(
                EXPLORATION_RATE.into(),
                ParameterChange::Multiply { factor: 0.5 }.to_value(),
            );
        }
        changes
    }

    fn collect_evidence(&self, data: &Value, _signals: &StrainSignals) -> Map<String, Value> {
        let mut evidence = Map::new();
        evidence.insert("mean_reward".into(), data["mean_reward"].clone());
        evidence.insert("reward_std".into(), data["reward_std"].clone());
        let episodes = data["episode_rewards"].as_array().map_or(0, Vec::len);
        evidence.insert("episodes".into(), json!(episodes));
        evidence
    }
}
