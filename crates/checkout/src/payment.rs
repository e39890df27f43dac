//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, UserId};
use domain::PaymentMethod;
use thiserror::Error;

/// What to charge.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub user_id: UserId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub email: Option<String>,
}

/// A captured charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    pub payment_id: String,
    pub amount: Money,
    pub email: Option<String>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown payment: {0}")]
    UnknownPayment(String),
}

/// The card payment provider, as seen by checkout.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures a charge.
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError>;

    /// Refunds a previously captured charge.
    async fn refund(&self, payment_id: &str) -> Result<(), PaymentError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    captured: HashMap<String, Charge>,
    refunded: Vec<String>,
    next_id: u32,
    decline: bool,
}

/// Gateway that approves every charge unless told to decline.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<Mutex<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent charge fail with [`PaymentError::Declined`].
    pub fn set_decline(&self, decline: bool) {
        self.lock().decline = decline;
    }

    /// Number of charges captured and not refunded.
    pub fn captured_count(&self) -> usize {
        self.lock().captured.len()
    }

    /// Payment ids refunded so far, oldest first.
    pub fn refunded(&self) -> Vec<String> {
        self.lock().refunded.clone()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryGatewayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<Charge, PaymentError> {
        let mut state = self.lock();
        if state.decline {
            return Err(PaymentError::Declined("card declined".to_string()));
        }
        if request.amount.is_negative() || request.amount.is_zero() {
            return Err(PaymentError::Declined(format!(
                "invalid amount {}",
                request.amount
            )));
        }

        state.next_id += 1;
        let charge = Charge {
            payment_id: format!("PAY-{:06}", state.next_id),
            amount: request.amount,
            email: request.email,
            captured_at: Utc::now(),
        };
        state
            .captured
            .insert(charge.payment_id.clone(), charge.clone());
        Ok(charge)
    }

    async fn refund(&self, payment_id: &str) -> Result<(), PaymentError> {
        let mut state = self.lock();
        if state.captured.remove(payment_id).is_none() {
            return Err(PaymentError::UnknownPayment(payment_id.to_string()));
        }
        state.refunded.push(payment_id.to_string());
        Ok(())
    }
}
