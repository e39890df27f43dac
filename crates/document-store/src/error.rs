use thiserror::Error;
use uuid::Uuid;

use crate::Version;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version did not match the expected version.
    #[error(
        "Concurrency conflict for {collection}/{id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        collection: String,
        id: Uuid,
        expected: Version,
        actual: Version,
    },

    /// The document was not found.
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: Uuid },

    /// A document with the same id or unique key already exists.
    #[error("Duplicate {key} '{value}' in {collection}")]
    DuplicateKey {
        collection: String,
        key: String,
        value: String,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
