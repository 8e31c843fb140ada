use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The write would violate a uniqueness or ownership constraint
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Failure reported by the underlying storage engine
    #[error("Storage backend error: {0}")]
    Backend(String),
}
