//! Unified error handling for the backend.

/// Backend error type.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Engine error: {0}")]
    Engine(#[from] tome_engine::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
