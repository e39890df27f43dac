//! Read models derived from an order.

use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use serde::Serialize;

use super::{
    Address, Order, OrderLine, OrderStatus, PaymentStatus, ShippingMethod, StatusEntry,
};
use crate::pagination::PageRequest;

/// Status history of one order, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct OrderHistory {
    pub order_number: String,
    pub history: Vec<StatusEntry>,
}

/// What a customer sees when tracking a parcel.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingView {
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub shipping_method: ShippingMethod,
    pub history: Vec<StatusEntry>,
    pub items: Vec<OrderLine>,
    pub shipping_address: Address,
    pub total: Money,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for TrackingView {
    fn from(order: Order) -> Self {
        Self {
            total: order.total(),
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            tracking_number: order.tracking_number,
            estimated_delivery: order.estimated_delivery,
            shipping_method: order.shipping_method,
            history: order.status_history,
            items: order.items,
            shipping_address: order.shipping_address,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelItem {
    pub name: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

/// Data encoded in the QR code printed on a shipping label.
#[derive(Debug, Clone, Serialize)]
pub struct QrPayload {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub order_id: OrderId,
    pub order_number: String,
    pub tracking_number: Option<String>,
    pub total_amount: Money,
    /// Milliseconds since the epoch when the label was generated.
    pub ts: i64,
}

/// Everything needed to print a shipping label.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingLabel {
    pub order_number: String,
    pub shipping_address: Address,
    pub items: Vec<LabelItem>,
    pub totals: LabelTotals,
    pub qr_payload: QrPayload,
}

impl ShippingLabel {
    pub fn for_order(order: Order, now: DateTime<Utc>) -> Self {
        let qr_payload = QrPayload {
            kind: "delivery",
            order_id: order.id,
            order_number: order.order_number.clone(),
            tracking_number: order.tracking_number.clone(),
            total_amount: order.totals.total,
            ts: now.timestamp_millis(),
        };
        Self {
            items: order
                .items
                .iter()
                .map(|l| LabelItem {
                    name: l.name.clone(),
                    quantity: l.quantity,
                })
                .collect(),
            totals: LabelTotals {
                subtotal: order.totals.subtotal,
                shipping: order.totals.shipping,
                tax: order.totals.tax,
                total: order.totals.total,
            },
            order_number: order.order_number,
            shipping_address: order.shipping_address,
            qr_payload,
        }
    }
}

/// Filters for the admin order listing.
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    /// Case-insensitive substring over order number, customer name and phone.
    pub q: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: PageRequest,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            status: None,
            payment_status: None,
            q: None,
            from: None,
            to: None,
            page: PageRequest::new(None, None, 20),
        }
    }
}
