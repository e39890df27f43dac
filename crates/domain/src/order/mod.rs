//! Order aggregate, status lifecycle and the order service.

mod aggregate;
mod commands;
mod numbers;
mod service;
mod state;
mod value_objects;
mod views;

pub use aggregate::{MAX_GIFT_MESSAGE_LEN, MAX_NOTES_LEN, Order};
pub use commands::{BulkOutcome, PaymentConfirmation, PlaceOrder, StatusChange};
pub use numbers::{order_number, tracking_number};
pub use service::{Caller, OrderService, TransitionOutcome};
pub use state::{OrderStatus, PaymentMethod, PaymentStatus, ShippingMethod};
pub use value_objects::{Address, OrderLine, PaymentResult, StatusEntry};
pub use views::{
    LabelItem, LabelTotals, OrderFilter, OrderHistory, QrPayload, ShippingLabel, TrackingView,
};

use common::ProductId;
use thiserror::Error;

/// Errors raised by order rules.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order has no line items.
    #[error("Order has no items")]
    EmptyOrder,

    /// Invalid quantity.
    #[error("Invalid quantity {quantity} for product {product_id} (must be at least 1)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    #[error("Notes cannot be more than {max} characters")]
    NotesTooLong { max: usize },

    #[error("Gift message cannot be more than {max} characters")]
    GiftMessageTooLong { max: usize },

    /// A required address field is blank.
    #[error("Address field '{0}' is required")]
    MissingAddressField(&'static str),
}
