#![deny(unsafe_code)]
//! # iai-audit
//!
//! Tamper-evident audit log for invariant-anchored evolution.
//!
//! Every entry carries the SHA-256 of its own canonical JSON encoding and the
//! hash of the entry before it (the first entry links to `"GENESIS"`).
//! Editing, deleting or reordering any persisted line breaks either that
//! line's digest or its successor's link, and [`ChainVerifier`] reports the
//! first offending index.
//!
//! The chain detects tampering by a third party. It does not protect against
//! the process that owns the log rewriting the whole file.

pub mod entry;
pub mod error;
pub mod integrity;
pub mod log;
pub mod sink;

pub use entry::{AuditEntry, AuditEventType, GENESIS_HASH};
pub use error::{AuditError, AuditResult};
pub use integrity::{ChainState, ChainVerification, ChainVerifier};
pub use log::{verify_file, AuditLog};
pub use sink::{AuditSink, FileAuditSink, MemoryAuditSink};
