use iai_types::FailureKind;

/// Errors from a decision oracle. The Authority never propagates these:
/// each one is folded into a fail-closed REJECT.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
    #[error("oracle timed out after {0}ms")]
    Timeout(u64),
    #[error("oracle returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid oracle response: {0}")]
    InvalidResponse(String),
    #[error("oracle misconfigured: {0}")]
    Configuration(String),
}

impl OracleError {
    /// Failure kind recorded in the fallback decision's concerns.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            OracleError::Timeout(_) => FailureKind::OracleTimeout,
            OracleError::InvalidResponse(_) => FailureKind::ParseError,
            OracleError::Unavailable(_)
            | OracleError::Http { .. }
            | OracleError::Configuration(_) => FailureKind::OracleUnavailable,
        }
    }
}

pub type OracleResult<T> = Result<T, OracleError>;
