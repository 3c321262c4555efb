use iai_types::ModelError;
use thiserror::Error;

/// Errors raised by the audit log and its sinks.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization error: {0}")]
    Serialization(String),

    #[error("audit chain broken at entry {index}: {reason}")]
    BrokenChain { index: usize, reason: String },

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        AuditError::Serialization(err.to_string())
    }
}

impl From<ModelError> for AuditError {
    fn from(err: ModelError) -> Self {
        AuditError::Serialization(err.to_string())
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
