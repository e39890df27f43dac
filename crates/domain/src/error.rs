//! Domain error types.

use common::ProductId;
use document_store::StoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the document store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The request was malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Not enough stock to satisfy the request.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A cart rule was violated.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// An order rule was violated.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The caller may not access the resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A write could not be applied after retrying.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Stable snake_case name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::NotFound { .. } => "not_found",
            DomainError::InvalidArgument(_) | DomainError::Order(_) => "invalid_argument",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::Cart(CartError::InvalidCoupon { .. }) => "invalid_coupon",
            DomainError::Cart(CartError::MinimumNotMet { .. }) => "minimum_not_met",
            DomainError::Cart(CartError::LineNotFound { .. }) => "not_found",
            DomainError::Cart(CartError::Empty) => "invalid_argument",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::Conflict(_) => "conflict",
            DomainError::Store(_) | DomainError::Serialization(_) => "internal",
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
