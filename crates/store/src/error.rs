use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid payload: expected 0 or {expected} bytes, got {actual}")]
    InvalidPayload { expected: usize, actual: usize },

    #[error("Suggestion store is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}
