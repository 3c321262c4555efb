//! Chain state and verification

use iai_types::to_canonical_string;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entry::{digest_without_hash, AuditEntry, GENESIS_HASH};

/// Running position of the writer in the hash chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    previous_hash: String,
    entry_count: u64,
}

impl ChainState {
    pub fn new() -> Self {
        Self {
            previous_hash: GENESIS_HASH.to_string(),
            entry_count: 0,
        }
    }

    /// Hash the next entry must link to
    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// Id the next entry will get
    pub fn next_entry_id(&self) -> u64 {
        self.entry_count
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Advance past an entry that has been durably appended
    pub fn advance(&mut self, entry: &AuditEntry) {
        self.previous_hash = entry.hash.clone();
        self.entry_count += 1;
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of chain verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub valid: bool,

    /// Number of non-blank lines examined
    pub total_entries: usize,

    /// Entries that checked out before the first failure
    pub verified_entries: usize,

    pub first_invalid_index: Option<usize>,

    pub reason: Option<String>,
}

impl ChainVerification {
    fn invalid(total_entries: usize, index: usize, reason: String) -> Self {
        Self {
            valid: false,
            total_entries,
            verified_entries: index,
            first_invalid_index: Some(index),
            reason: Some(reason),
        }
    }
}

/// Verifies persisted audit lines
pub struct ChainVerifier;

impl ChainVerifier {
    /// Verify `lines` in order. Never fails: anything wrong with a line is
    /// reported as the first invalid index.
    pub fn verify_lines<L: AsRef<str>>(lines: &[L]) -> ChainVerification {
        Self::replay(lines).0
    }

    /// Verify `lines` and return the chain state after the last valid entry.
    pub fn replay<L: AsRef<str>>(lines: &[L]) -> (ChainVerification, ChainState) {
        let lines: Vec<&str> = lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|l| !l.trim().is_empty())
            .collect();
        let total = lines.len();
        let mut state = ChainState::new();

        for (index, line) in lines.iter().enumerate() {
            if let Err(reason) = Self::check_line(index, line, &mut state) {
                return (ChainVerification::invalid(total, index, reason), state);
            }
        }

        let verification = ChainVerification {
            valid: true,
            total_entries: total,
            verified_entries: total,
            first_invalid_index: None,
            reason: None,
        };
        (verification, state)
    }

    fn check_line(index: usize, line: &str, state: &mut ChainState) -> Result<(), String> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| format!("unparseable line: {e}"))?;

        let canonical =
            to_canonical_string(&value).map_err(|e| format!("cannot re-encode line: {e}"))?;
        if canonical != line {
            return Err("line is not in canonical form".to_string());
        }

        let entry: AuditEntry = serde_json::from_value(value.clone())
            .map_err(|e| format!("malformed entry: {e}"))?;

        if entry.entry_id != state.next_entry_id() {
            return Err(format!(
                "entry_id {} out of sequence (expected {})",
                entry.entry_id,
                state.next_entry_id()
            ));
        }

        if entry.previous_hash != state.previous_hash() {
            return Err(format!(
                "broken chain link (expected prev: {}, got: {})",
                state.previous_hash(),
                entry.previous_hash
            ));
        }

        let recomputed =
            digest_without_hash(value).map_err(|e| format!("cannot hash entry: {e}"))?;
        if recomputed != entry.hash {
            return Err(format!(
                "hash mismatch (stored: {}, computed: {})",
                entry.hash, recomputed
            ));
        }

        state.advance(&entry);
        Ok(())
    }
}
