use thiserror::Error;

/// Errors raised while encoding model values.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;
