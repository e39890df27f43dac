//! Checkout error types.

use domain::DomainError;
use thiserror::Error;

/// Errors that can end a checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The gateway refused or could not take the charge. Stock held for
    /// the checkout has been released.
    #[error("Payment failed: {reason}")]
    PaymentDeclined { reason: String },

    /// A domain rule or storage operation failed.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl CheckoutError {
    /// Stable snake_case label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            CheckoutError::PaymentDeclined { .. } => "payment_declined",
            CheckoutError::Domain(e) => e.kind(),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
