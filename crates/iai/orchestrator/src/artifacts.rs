//! Per-generation artifact persistence.
//!
//! `FileArtifactStore` lays a run out as
//!
//! ```text
//! <run_dir>/config.json
//! <run_dir>/generation_000/{result,proposal,decision,invariants}.json
//! <run_dir>/evolution_summary.json
//! ```
//!
//! so a reporting process can rebuild the history without replaying the run.

use async_trait::async_trait;
use iai_types::{AuthorityDecision, GenerationResult, Invariants, Proposal};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::report::RunSummary;

pub const CONFIG_FILE: &str = "config.json";
pub const SUMMARY_FILE: &str = "evolution_summary.json";

/// What one generation leaves behind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationArtifacts {
    pub generation: u32,
    pub result: GenerationResult,
    pub proposal: Proposal,
    pub decision: Option<AuthorityDecision>,
    /// Invariants in force after the generation.
    pub invariants: Invariants,
}

/// Durable storage for run artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save_config(&self, config: &Value) -> OrchestratorResult<()>;

    async fn save_generation(&self, artifacts: &GenerationArtifacts) -> OrchestratorResult<()>;

    async fn save_summary(&self, summary: &RunSummary) -> OrchestratorResult<()>;
}

/// Directory-per-generation JSON store.
pub struct FileArtifactStore {
    run_dir: PathBuf,
}

impl FileArtifactStore {
    pub async fn new(run_dir: impl Into<PathBuf>) -> OrchestratorResult<Self> {
        let run_dir = run_dir.into();
        tokio::fs::create_dir_all(&run_dir).await?;
        Ok(Self { run_dir })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn generation_dir(&self, generation: u32) -> PathBuf {
        self.run_dir.join(format!("generation_{generation:03}"))
    }
}

/// Write via `.tmp` then rename so a crash never leaves a torn file.
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> OrchestratorResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn save_config(&self, config: &Value) -> OrchestratorResult<()> {
        write_json(&self.run_dir.join(CONFIG_FILE), config).await
    }

    async fn save_generation(&self, artifacts: &GenerationArtifacts) -> OrchestratorResult<()> {
        let dir = self.generation_dir(artifacts.generation);
        tokio::fs::create_dir_all(&dir).await?;

        write_json(&dir.join("result.json"), &artifacts.result).await?;
        write_json(&dir.join("proposal.json"), &artifacts.proposal).await?;
        if let Some(decision) = &artifacts.decision {
            write_json(&dir.join("decision.json"), decision).await?;
        }
        write_json(&dir.join("invariants.json"), &artifacts.invariants).await?;

        debug!(dir = %dir.display(), "Generation artifacts written");
        Ok(())
    }

    async fn save_summary(&self, summary: &RunSummary) -> OrchestratorResult<()> {
        write_json(&self.run_dir.join(SUMMARY_FILE), summary).await
    }
}

/// Read `evolution_summary.json` from a run directory.
pub async fn load_summary(run_dir: impl AsRef<Path>) -> OrchestratorResult<RunSummary> {
    let path = run_dir.as_ref().join(SUMMARY_FILE);
    let contents = tokio::fs::read_to_string(&path).await.map_err(|e| {
        OrchestratorError::Artifact(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&contents)?)
}

/// In-memory artifact store (for testing).
#[derive(Default)]
pub struct MemoryArtifactStore {
    config: Mutex<Option<Value>>,
    generations: Mutex<Vec<GenerationArtifacts>>,
    summary: Mutex<Option<RunSummary>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<Value> {
        self.config.lock().clone()
    }

    pub fn generations(&self) -> Vec<GenerationArtifacts> {
        self.generations.lock().clone()
    }

    pub fn summary(&self) -> Option<RunSummary> {
        self.summary.lock().clone()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn save_config(&self, config: &Value) -> OrchestratorResult<()> {
        *self.config.lock() = Some(config.clone());
        Ok(())
    }

    async fn save_generation(&self, artifacts: &GenerationArtifacts) -> OrchestratorResult<()> {
        self.generations.lock().push(artifacts.clone());
        Ok(())
    }

    async fn save_summary(&self, summary: &RunSummary) -> OrchestratorResult<()> {
        *self.summary.lock() = Some(summary.clone());
        Ok(())
    }
}
