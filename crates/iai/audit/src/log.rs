//! The hash-chained audit log writer

use chrono::Utc;
use iai_types::{to_canonical_value, AuthorityDecision, Invariants, Proposal};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::entry::{AuditEntry, AuditEventType};
use crate::error::{AuditError, AuditResult};
use crate::integrity::{ChainState, ChainVerification, ChainVerifier};
use crate::sink::{read_jsonl, AuditSink};

/// Single-writer, append-only, hash-chained log over an [`AuditSink`].
///
/// Chain state only advances after the sink accepted the line, so a failed
/// append leaves no partial entry and no gap in `entry_id`.
pub struct AuditLog<S> {
    sink: S,
    chain: ChainState,
}

impl<S: AuditSink> AuditLog<S> {
    /// Open a log over `sink`, resuming after any entries it already holds.
    ///
    /// Refuses to extend a chain that does not verify.
    pub async fn open(sink: S) -> AuditResult<Self> {
        let lines = sink.read_lines().await?;
        let (verification, chain) = ChainVerifier::replay(&lines);
        if !verification.valid {
            let index = verification.first_invalid_index.unwrap_or_default();
            let reason = verification.reason.unwrap_or_default();
            warn!(index, %reason, "Refusing to resume a broken audit chain");
            return Err(AuditError::BrokenChain { index, reason });
        }
        if chain.entry_count() > 0 {
            info!(entries = chain.entry_count(), "Resumed audit log");
        }
        Ok(Self { sink, chain })
    }

    /// Append an event and return its hash.
    pub async fn log(
        &mut self,
        event_type: AuditEventType,
        data: Map<String, Value>,
        metadata: Map<String, Value>,
    ) -> AuditResult<String> {
        let entry = AuditEntry::seal(
            self.chain.next_entry_id(),
            Utc::now(),
            event_type,
            data,
            metadata,
            self.chain.previous_hash(),
        )?;
        let line = entry.to_line()?;

        self.sink.append_line(&line).await?;
        self.chain.advance(&entry);

        debug!(
            entry_id = entry.entry_id,
            event_type = %event_type,
            hash = %entry.hash,
            "Audit entry appended"
        );
        Ok(entry.hash)
    }

    pub async fn log_proposal(&mut self, generation: u32, proposal: &Proposal) -> AuditResult<String> {
        let mut data = Map::new();
        data.insert("generation".into(), Value::from(generation));
        data.insert("proposal".into(), to_canonical_value(proposal)?);

        let mut metadata = Map::new();
        metadata.insert("system_name".into(), Value::from(proposal.system_name.clone()));
        metadata.insert(
            "strain_signal_count".into(),
            Value::from(proposal.strain_signals.count_detected()),
        );

        self.log(AuditEventType::Proposal, data, metadata).await
    }

    /// Record a decision, linked to the PROPOSAL entry it rules on.
    pub async fn log_decision(
        &mut self,
        generation: u32,
        decision: &AuthorityDecision,
        proposal_hash: &str,
    ) -> AuditResult<String> {
        let mut data = Map::new();
        data.insert("generation".into(), Value::from(generation));
        data.insert("proposal_hash".into(), Value::from(proposal_hash));
        data.insert("decision".into(), to_canonical_value(decision)?);

        let mut metadata = Map::new();
        metadata.insert("verdict".into(), Value::from(decision.verdict.as_str()));
        metadata.insert("decided_by".into(), Value::from(decision.decided_by.clone()));
        metadata.insert("effective_change".into(), Value::Bool(decision.effective_change()));

        self.log(AuditEventType::Decision, data, metadata).await
    }

    /// Record an invariant replacement, linked to the DECISION entry that allowed it.
    pub async fn log_invariant_change(
        &mut self,
        generation: u32,
        old: &Invariants,
        new: &Invariants,
        decision_hash: &str,
    ) -> AuditResult<String> {
        let mut data = Map::new();
        data.insert("generation".into(), Value::from(generation));
        data.insert("decision_hash".into(), Value::from(decision_hash));
        data.insert("old_invariants".into(), to_canonical_value(old)?);
        data.insert("new_invariants".into(), to_canonical_value(new)?);

        let mut metadata = Map::new();
        metadata.insert("old_primary_metric".into(), Value::from(old.primary_metric.clone()));
        metadata.insert("new_primary_metric".into(), Value::from(new.primary_metric.clone()));

        self.log(AuditEventType::InvariantChange, data, metadata).await
    }

    /// Number of entries in the chain.
    pub fn entry_count(&self) -> u64 {
        self.chain.entry_count()
    }

    /// Hash of the last entry, or `GENESIS` for an empty log.
    pub fn head_hash(&self) -> &str {
        self.chain.previous_hash()
    }

    /// Re-read and verify the stored chain. Read-only.
    pub async fn verify_chain(&self) -> AuditResult<ChainVerification> {
        let lines = self.sink.read_lines().await?;
        Ok(ChainVerifier::verify_lines(&lines))
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Verify a JSONL audit log on disk.
pub async fn verify_file(path: impl AsRef<Path>) -> AuditResult<ChainVerification> {
    let lines = read_jsonl(path.as_ref()).await?;
    Ok(ChainVerifier::verify_lines(&lines))
}
