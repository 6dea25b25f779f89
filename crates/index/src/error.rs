use thiserror::Error;

pub type Result<T> = std::result::Result<T, AutocompleteError>;

#[derive(Error, Debug)]
pub enum AutocompleteError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Suggestion store error: {0}")]
    StoreError(#[from] autocomplete_store::StoreError),

    #[error("Index was not built: {0}")]
    BuildFailure(String),

    #[error("Indexing was interrupted.")]
    Interrupted,

    #[error("Autocomplete index is not available")]
    StoreUnavailable,

    #[error("Autocomplete is not enabled.")]
    Disabled,

    #[error("Invalid label config: {0}")]
    InvalidLabelConfig(String),

    #[error("Expected an IRI, got: {0}")]
    NotAnIri(String),

    #[error("{0}")]
    Other(String),
}
