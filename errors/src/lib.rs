//! # Mirror Errors
//!
//! Error handling for the Redis-structure mirror.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields on every variant so messages carry their context
//! - No variant is retried or recovered locally; callers decide

use thiserror::Error;

/// Document schema errors.
///
/// These are programming errors in a document type's declarations or misuse
/// of a document that has not been persisted yet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Field {field} does not exist in {document}")]
    FieldNotFound { field: String, document: String },

    #[error("No default value for field {field} in {document}")]
    NoDefaultDeclared { field: String, document: String },

    #[error("{document} has not been persisted yet")]
    NotPersisted { document: String },

    #[error("Failed to serialize {document}: {reason}")]
    Serialization { document: String, reason: String },
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Connection to {backend} failed: {reason}")]
    ConnectionError { backend: String, reason: String },

    #[error("Query on {backend} failed: {reason}")]
    QueryError { backend: String, reason: String },

    #[error("Duplicate key in {collection}: {reason}")]
    DuplicateKey { collection: String, reason: String },

    #[error("Serialization error: {error_type} - {reason}")]
    SerializationError { error_type: String, reason: String },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl StorageError {
    /// True when the store rejected a write because of a unique index.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StorageError::DuplicateKey { .. })
    }
}
