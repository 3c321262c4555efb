//! Audit entry types

use chrono::{DateTime, Utc};
use iai_types::{to_canonical_string, to_canonical_value};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::AuditResult;

/// `previous_hash` of the first entry in every chain.
pub const GENESIS_HASH: &str = "GENESIS";

/// Kind of event recorded in the log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    Proposal,
    Decision,
    InvariantChange,
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditEventType::Proposal => "PROPOSAL",
            AuditEventType::Decision => "DECISION",
            AuditEventType::InvariantChange => "INVARIANT_CHANGE",
        };
        f.write_str(s)
    }
}

/// One line of the audit log.
///
/// No field has a serde default: an entry missing any field is malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the chain, starting at 0
    pub entry_id: u64,

    pub timestamp: DateTime<Utc>,

    pub event_type: AuditEventType,

    /// Event payload
    pub data: Map<String, Value>,

    /// Additional context
    pub metadata: Map<String, Value>,

    /// Hash of the previous entry, or [`GENESIS_HASH`]
    pub previous_hash: String,

    /// SHA-256 over the canonical encoding of every other field
    pub hash: String,
}

impl AuditEntry {
    /// Build an entry and compute its hash.
    pub fn seal(
        entry_id: u64,
        timestamp: DateTime<Utc>,
        event_type: AuditEventType,
        data: Map<String, Value>,
        metadata: Map<String, Value>,
        previous_hash: impl Into<String>,
    ) -> AuditResult<Self> {
        let mut entry = Self {
            entry_id,
            timestamp,
            event_type,
            data,
            metadata,
            previous_hash: previous_hash.into(),
            hash: String::new(),
        };
        entry.hash = entry.compute_hash()?;
        Ok(entry)
    }

    /// Recompute the digest from the entry's content, ignoring the stored hash.
    pub fn compute_hash(&self) -> AuditResult<String> {
        digest_without_hash(to_canonical_value(self)?)
    }

    /// The persisted form: canonical JSON of the full entry, hash included.
    pub fn to_line(&self) -> AuditResult<String> {
        Ok(to_canonical_string(self)?)
    }

    pub fn verify_hash(&self) -> AuditResult<bool> {
        Ok(self.compute_hash()? == self.hash)
    }
}

/// SHA-256 hex digest of `value` with its top-level `hash` key removed.
pub(crate) fn digest_without_hash(mut value: Value) -> AuditResult<String> {
    if let Value::Object(map) = &mut value {
        map.remove("hash");
    }
    let canonical = to_canonical_string(&value)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
