//! Inputs to the order lifecycle operations.

use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{
    Address, OrderLine, OrderStatus, PaymentMethod, PaymentResult, PaymentStatus, ShippingMethod,
};
use crate::cart::Coupon;

/// Everything needed to record a new order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub shipping_address: Address,
    /// Defaults to the shipping address.
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_result: Option<PaymentResult>,
    pub coupon: Option<Coupon>,
    pub shipping_method: ShippingMethod,
    pub notes: Option<String>,
    pub is_gift: bool,
    pub gift_message: Option<String>,
    /// Set when the caller already took the stock for these lines.
    pub stock_reserved: bool,
}

impl PlaceOrder {
    /// A pending, unpaid order with no extras.
    pub fn new(
        user_id: UserId,
        lines: Vec<OrderLine>,
        shipping_address: Address,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            user_id,
            lines,
            shipping_address,
            billing_address: None,
            payment_method,
            payment_status: PaymentStatus::Pending,
            payment_result: None,
            coupon: None,
            shipping_method: ShippingMethod::Standard,
            notes: None,
            is_gift: false,
            gift_message: None,
            stock_reserved: false,
        }
    }
}

/// An admin request to move an order to a status.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(skip)]
    pub actor: Option<UserId>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub shipping_method: Option<ShippingMethod>,
}

impl StatusChange {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            note: None,
            actor: None,
            tracking_number: None,
            shipping_method: None,
        }
    }

    pub fn by(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }
}

/// Outcome of a payment reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentConfirmation {
    pub payment_id: String,
    pub succeeded: bool,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

/// Per-order result of a bulk status change.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub order_id: OrderId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
