//! Reporting error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while building a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The requested range ends before it starts.
    #[error("Invalid range: from {from} is after to {to}")]
    InvalidRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    /// The interval name is not one of day, week or month.
    #[error("Invalid interval '{0}' (expected day, week or month)")]
    InvalidInterval(String),

    /// Loading orders failed.
    #[error(transparent)]
    Domain(#[from] domain::DomainError),

    /// Reading the product collection failed.
    #[error("Store error: {0}")]
    Store(#[from] document_store::StoreError),

    /// A stored product could not be decoded.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Result type for reporting operations.
pub type Result<T> = std::result::Result<T, ReportError>;
