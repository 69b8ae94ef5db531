use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Index has not been built")]
    NotBuilt,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding provider failed: {0}")]
    Embedding(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Keyword index error: {0}")]
    Index(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn persistence(err: impl std::fmt::Display) -> Self { Self::Persistence(err.to_string()) }

    pub fn embedding(err: impl std::fmt::Display) -> Self { Self::Embedding(err.to_string()) }
}

pub type Result<T> = std::result::Result<T, Error>;
