//! Configuration for the `iai` binary

use iai_authority::{AuthorityConfig, HttpOracleConfig};
use iai_orchestrator::{InvariantUpdateMode, OrchestratorConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::workload::{WorkloadConfig, MEAN_REWARD};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IaiConfig {
    /// Evolution run settings
    #[serde(default)]
    pub run: RunConfig,

    /// Authority review settings
    #[serde(default)]
    pub authority: AuthorityConfig,

    /// Decision oracle selection
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Audit log settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Evolution run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,

    /// Run directory for artifacts and, by default, the audit log
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub update_mode: InvariantUpdateMode,

    /// Metric compared before and after an applied change
    #[serde(default = "default_tracking_metric")]
    pub tracking_metric: Option<String>,

    /// Opaque parameters handed to the executor every generation
    #[serde(default)]
    pub params: Value,

    #[serde(default)]
    pub workload: WorkloadConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_generations: default_max_generations(),
            output_dir: default_output_dir(),
            update_mode: InvariantUpdateMode::default(),
            tracking_metric: default_tracking_metric(),
            params: Value::Null,
            workload: WorkloadConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let config = OrchestratorConfig::default()
            .with_max_generations(self.max_generations)
            .with_update_mode(self.update_mode);
        match &self.tracking_metric {
            Some(metric) => config.with_tracking_metric(metric.clone()),
            None => config,
        }
    }
}

/// Which oracle backs the Authority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    /// Deterministic rule engine
    #[default]
    Rule,
    /// OpenAI-compatible chat completions endpoint
    Http,
}

/// Oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub kind: OracleKind,

    /// Strain signals the rule engine needs before it accepts
    #[serde(default = "default_accept_min_signals")]
    pub accept_min_signals: usize,

    #[serde(default)]
    pub http: HttpOracleConfig,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: OracleKind::default(),
            accept_min_signals: default_accept_min_signals(),
            http: HttpOracleConfig::default(),
        }
    }
}

/// Audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Explicit log path; defaults to `<output_dir>/<file_name>`
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_audit_file_name")]
    pub file_name: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            file_name: default_audit_file_name(),
        }
    }
}

impl AuditConfig {
    pub fn resolve(&self, output_dir: &std::path::Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| output_dir.join(&self.file_name))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_max_generations() -> u32 {
    5
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("runs/latest")
}

fn default_tracking_metric() -> Option<String> {
    Some(MEAN_REWARD.to_string())
}

fn default_accept_min_signals() -> usize {
    2
}

fn default_audit_file_name() -> String {
    "audit.jsonl".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl IaiConfig {
    /// Defaults, then the optional file, then `IAI_` environment variables
    /// (`IAI_RUN__MAX_GENERATIONS=8`, `IAI_ORACLE__KIND=http`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&IaiConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("IAI")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
