//! Checkout progress.

use serde::{Deserialize, Serialize};

/// Where a checkout is in its run.
///
/// ```text
/// Started ──► StockReserved ──► PaymentCaptured ──► OrderPlaced ──► Completed
///    │              │                  │
///    └──────────────┴──────────────────┴──► Compensating ──► Failed
/// ```
///
/// Steps that do not apply (no reservation, cash on delivery) are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Started,
    StockReserved,
    PaymentCaptured,
    OrderPlaced,
    Completed,
    Compensating,
    Failed,
}

impl CheckoutState {
    /// Returns true if the checkout may move to `next`.
    pub fn can_advance_to(&self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        match (self, next) {
            (Started, StockReserved | PaymentCaptured | OrderPlaced) => true,
            (StockReserved, PaymentCaptured | OrderPlaced) => true,
            (PaymentCaptured, OrderPlaced) => true,
            (OrderPlaced, Completed) => true,
            (Started | StockReserved | PaymentCaptured, Compensating) => true,
            (Compensating, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckoutState::Completed | CheckoutState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Started => "started",
            CheckoutState::StockReserved => "stock_reserved",
            CheckoutState::PaymentCaptured => "payment_captured",
            CheckoutState::OrderPlaced => "order_placed",
            CheckoutState::Completed => "completed",
            CheckoutState::Compensating => "compensating",
            CheckoutState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
