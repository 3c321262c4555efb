#![deny(unsafe_code)]
//! # iai-types
//!
//! Value contracts shared by every part of an invariant-anchored evolution run.
//!
//! An **invariant** is an externally-owned success criterion that the learning
//! loop may *propose* to change but never change on its own. The types here
//! carry those proposals to the Authority and carry the Authority's verdict back:
//!
//! ```text
//! GenerationResult ──▶ Challenger ──▶ Proposal ──▶ Authority ──▶ AuthorityDecision
//!        ▲                                                           │
//!        └──────────── Invariants (replaced only on ACCEPT/MODIFY) ◀─┘
//! ```
//!
//! All types are plain data: construction never fails, and deserialization
//! fills defaults for any missing key because decision payloads cross an LLM
//! text boundary that is not guaranteed to be well-formed.
//! [`canonical`] provides the sorted-key JSON form used as the audit hashing input.

pub mod canonical;
pub mod decision;
pub mod error;
pub mod generation;
pub mod invariants;
pub mod proposal;
pub mod strain;
pub mod violation;

pub use canonical::{canonicalize, to_canonical_string, to_canonical_value};
pub use decision::{clamp_confidence, AuthorityDecision, FailureKind, ModifiedProposal, Verdict};
pub use error::{ModelError, ModelResult};
pub use generation::{
    EvolutionHistory, GenerationContext, GenerationResult, CONTEXT_RATIONALE_CHARS,
};
pub use invariants::Invariants;
pub use proposal::{
    interpret_parameter_changes, Critique, ParameterChange, Proposal, ProposedMetric, Severity,
};
pub use strain::{StrainSignal, StrainSignals};
pub use violation::{InvariantViolation, ViolationSeverity};
