use iai_audit::AuditError;

/// Errors from the evolution orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("audit log failure: {0}")]
    Audit(#[from] AuditError),
    #[error("artifact store failure: {0}")]
    Artifact(String),
    #[error("generation executor failed: {0}")]
    Executor(String),
    #[error("evolution stopped by host")]
    Stopped,
    #[error("max generations reached: {0}")]
    MaxGenerationsReached(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
