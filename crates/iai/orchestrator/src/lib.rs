#![deny(unsafe_code)]
//! # iai-orchestrator
//!
//! The evolution loop: each generation runs the domain system under the
//! current invariants, asks the Challenger for strain, and, when strain is
//! found, submits the proposal to the Authority. Invariants change only on
//! a ratified proposal, and only after the audit log holds the PROPOSAL,
//! DECISION and INVARIANT_CHANGE entries for it.
//!
//! ```text
//! RUN -> EVALUATE -> CHALLENGE -> (no strain) -> next
//!                  -> REVIEW -> UPDATE-OR-REJECT -> PERSIST -> next
//! ```

pub mod artifacts;
pub mod challenger;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod update;

pub use artifacts::{load_summary, ArtifactStore, FileArtifactStore, GenerationArtifacts, MemoryArtifactStore};
pub use challenger::{critiques_for, Challenger, DetectorChallenger, StrainDetector, DEFAULT_THRESHOLDS};
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, OrchestratorResult};
pub use evaluator::{Evaluator, LimitEvaluator};
pub use executor::{BaselineResults, GenerationExecutor, ScriptedExecutor, ScriptedGeneration, BEST_PERFORMANCE};
pub use metrics::MetaMetrics;
pub use orchestrator::{GenerationOutcome, Orchestrator, StopHandle};
pub use report::{RunReport, RunSummary};
pub use update::{derive_invariants, ChangeSource, InvariantUpdateMode};
