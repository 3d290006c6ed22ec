//! Error types for the Tome engine.

use crate::{
    document::LifecycleState, ownership::OwnershipLevel, validation::ValidationFailures,
    DocumentType, FieldName, UserId,
};
use thiserror::Error;

/// All possible errors from the engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(ValidationFailures),

    #[error("invalid changes: {0}")]
    InvalidChanges(String),

    #[error("unknown field: {0}")]
    UnknownField(FieldName),

    #[error("unknown document type: {0}")]
    UnknownDocumentType(DocumentType),

    #[error("unknown embedded collection: {0}")]
    UnknownEmbeddedCollection(FieldName),

    #[error("document has no id")]
    MissingId,

    #[error("document id is immutable once assigned")]
    ImmutableId,

    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("user '{user}' requires {required} ownership of {document_type}, has {actual}")]
    Permission {
        user: UserId,
        document_type: DocumentType,
        required: OwnershipLevel,
        actual: OwnershipLevel,
    },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
