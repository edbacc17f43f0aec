use thiserror::Error;

/// Errors surfaced by a [`Repository`](crate::repository::Repository) backend.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage serialization failed: {0}")]
    Serialization(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Caller-visible failures of the shortening engine.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("short code already exists: {0}")]
    CodeAlreadyExists(String),
    #[error("invalid url format: {0}")]
    InvalidUrlFormat(String),
    #[error("short code not found: {0}")]
    CodeNotFound(String),
    #[error("no free short code found after {attempts} attempts")]
    GenerationExhausted { attempts: usize },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
