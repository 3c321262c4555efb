#![deny(unsafe_code)]
//! # iai-authority
//!
//! The Authority decides whether a Challenger's proposal may change the
//! system's invariants. Judgment comes from an external [`DecisionOracle`]
//! (a rule engine, a human, or an LLM behind [`HttpOracle`]); the Authority
//! bounds the context the oracle sees, parses its answer and **fails
//! closed**: an oracle that is unreachable, slow, or answers with anything
//! other than a well-formed decision yields REJECT with zero confidence.

pub mod authority;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod oracle;
pub mod parser;
pub mod prompt;
pub mod rule;

pub use authority::{Authority, DecisionRecord};
pub use config::{AuthorityConfig, Strictness};
pub use context::ReviewContext;
pub use error::{OracleError, OracleResult};
pub use http::{HttpOracle, HttpOracleConfig};
pub use oracle::{DecisionOracle, FailingOracle, ScriptedOracle, StaticOracle};
pub use parser::{parse_decision, ParsedDecision, NOT_ACTIONABLE_CONCERN};
pub use prompt::PromptBuilder;
pub use rule::RuleOracle;
