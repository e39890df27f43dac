//! Order aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{Money, OrderId, ProductId, UserId};
use document_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::notify::OrderSummary;
use crate::pricing::Totals;
use crate::settings::CommerceSettings;

use super::{
    Address, OrderError, OrderLine, OrderStatus, PaymentConfirmation, PaymentMethod,
    PaymentResult, PaymentStatus, PlaceOrder, ShippingMethod, StatusChange, StatusEntry, numbers,
};

/// Longest customer note accepted at checkout.
pub const MAX_NOTES_LEN: usize = 500;

/// Longest gift message accepted at checkout.
pub const MAX_GIFT_MESSAGE_LEN: usize = 200;

/// Order aggregate root.
///
/// Line items and totals are frozen at creation. Afterwards only status
/// transitions and payment confirmation change the order, and every status
/// change appends to `status_history`, so the last entry always carries the
/// current status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: PaymentMethod,
    pub payment_result: Option<PaymentResult>,
    pub totals: Totals,
    pub coupon_code: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_method: ShippingMethod,
    pub status_history: Vec<StatusEntry>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub is_gift: bool,
    pub gift_message: Option<String>,
    /// Whether stock is currently held for this order.
    pub stock_reserved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: Version,
}

impl Order {
    /// Validates the input and builds a pending order priced from its lines.
    pub fn place(
        cmd: PlaceOrder,
        order_number: String,
        settings: &CommerceSettings,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if cmd.lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        if let Some(line) = cmd.lines.iter().find(|l| l.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        if cmd.notes.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
            return Err(OrderError::NotesTooLong { max: MAX_NOTES_LEN });
        }
        if cmd
            .gift_message
            .as_ref()
            .is_some_and(|m| m.chars().count() > MAX_GIFT_MESSAGE_LEN)
        {
            return Err(OrderError::GiftMessageTooLong {
                max: MAX_GIFT_MESSAGE_LEN,
            });
        }
        cmd.shipping_address.validate(true)?;
        if let Some(ref billing) = cmd.billing_address {
            billing.validate(false)?;
        }

        let totals = Totals::compute(
            cmd.lines.iter().map(|l| (l.price, l.quantity)),
            cmd.coupon.as_ref(),
            settings,
        );
        let billing_address = cmd
            .billing_address
            .unwrap_or_else(|| cmd.shipping_address.clone());

        Ok(Self {
            id: OrderId::new(),
            order_number,
            user_id: cmd.user_id,
            items: cmd.lines,
            shipping_address: cmd.shipping_address,
            billing_address,
            payment_method: cmd.payment_method,
            payment_result: cmd.payment_result,
            totals,
            coupon_code: cmd.coupon.map(|c| c.code),
            status: OrderStatus::Pending,
            payment_status: cmd.payment_status,
            shipping_method: cmd.shipping_method,
            status_history: vec![StatusEntry {
                status: OrderStatus::Pending,
                note: "Order created".to_string(),
                changed_at: now,
                changed_by: Some(cmd.user_id),
            }],
            tracking_number: None,
            estimated_delivery: None,
            notes: cmd.notes.filter(|n| !n.trim().is_empty()),
            is_gift: cmd.is_gift,
            gift_message: cmd.gift_message.filter(|m| !m.trim().is_empty()),
            stock_reserved: cmd.stock_reserved,
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        })
    }

    /// Applies an admin status change. Returns false when it would change
    /// nothing (same status, no new tracking number or shipping method).
    pub fn apply_status_change(
        &mut self,
        change: &StatusChange,
        settings: &CommerceSettings,
        now: DateTime<Utc>,
    ) -> bool {
        let tracking_number = change
            .tracking_number
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let tracking_changed =
            tracking_number.is_some_and(|t| self.tracking_number.as_deref() != Some(t));
        let method_changed = change
            .shipping_method
            .is_some_and(|m| m != self.shipping_method);

        if change.status == self.status && !tracking_changed && !method_changed {
            return false;
        }

        let note = change
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Status updated to {}", change.status));
        self.status_history.push(StatusEntry {
            status: change.status,
            note,
            changed_at: now,
            changed_by: change.actor,
        });
        self.status = change.status;

        if let Some(tracking_number) = tracking_number {
            self.tracking_number = Some(tracking_number.to_string());
        }
        if let Some(method) = change.shipping_method {
            self.shipping_method = method;
        }
        if self.status == OrderStatus::Shipped {
            if self.tracking_number.is_none() {
                self.tracking_number = Some(numbers::tracking_number(now));
            }
            if self.estimated_delivery.is_none() {
                self.estimated_delivery =
                    Some(now + Duration::days(settings.estimated_delivery_days));
            }
        }
        self.updated_at = now;
        true
    }

    /// Records a payment outcome. Returns false if it was already recorded.
    pub fn confirm_payment(&mut self, confirmation: &PaymentConfirmation, now: DateTime<Utc>) -> bool {
        if confirmation.succeeded {
            let already_recorded = self.payment_status == PaymentStatus::Paid
                && self
                    .payment_result
                    .as_ref()
                    .is_some_and(|r| r.id == confirmation.payment_id);
            if already_recorded {
                return false;
            }
            self.payment_status = PaymentStatus::Paid;
            self.payment_result = Some(PaymentResult {
                id: confirmation.payment_id.clone(),
                status: "succeeded".to_string(),
                update_time: confirmation
                    .update_time
                    .clone()
                    .unwrap_or_else(|| now.to_rfc3339()),
                email_address: confirmation.email.clone(),
            });
            if self.status == OrderStatus::Pending {
                self.status = OrderStatus::Processing;
                self.status_history.push(StatusEntry {
                    status: OrderStatus::Processing,
                    note: "Payment confirmed".to_string(),
                    changed_at: now,
                    changed_by: None,
                });
            }
        } else {
            if self.payment_status == PaymentStatus::Failed {
                return false;
            }
            self.payment_status = PaymentStatus::Failed;
        }
        self.updated_at = now;
        true
    }

    /// True if the order was shipped at any point, even if an admin later
    /// moved it back.
    pub fn ever_shipped(&self) -> bool {
        self.status.has_shipped() || self.status_history.iter().any(|e| e.status.has_shipped())
    }

    /// (product, quantity) pairs for stock reservation.
    pub fn stock_lines(&self) -> Vec<(ProductId, u32)> {
        self.items.iter().map(|l| (l.product_id, l.quantity)).collect()
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }

    /// Number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|l| l.quantity).sum()
    }

    /// Returns true if the history is non-empty and ends with the current status.
    pub fn history_is_consistent(&self) -> bool {
        self.status_history
            .last()
            .is_some_and(|entry| entry.status == self.status)
    }

    /// Summary used in notification templates.
    pub fn summary(&self) -> OrderSummary {
        OrderSummary {
            order_id: self.id,
            order_number: self.order_number.clone(),
            status: self.status.to_string(),
            total: self.totals.total,
            tracking_number: self.tracking_number.clone(),
            estimated_delivery: self.estimated_delivery,
        }
    }
}

impl Aggregate for Order {
    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn collection() -> &'static str {
        "orders"
    }

    fn id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("order_number", self.order_number.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            address: "12 MG Road".into(),
            city: "Pune".into(),
            state: "MH".into(),
            zip_code: "411001".into(),
            country: "India".into(),
            phone: Some("9876543210".into()),
        }
    }

    fn line(quantity: u32, price: i64) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(),
            name: "Kurta".into(),
            price: Money::from_major(price),
            quantity,
            size: "L".into(),
            color: None,
            image: None,
        }
    }

    fn place(lines: Vec<OrderLine>) -> Result<Order, OrderError> {
        let cmd = PlaceOrder::new(UserId::new(), lines, address(), PaymentMethod::CreditCard);
        Order::place(
            cmd,
            "GF2403070001".into(),
            &CommerceSettings::default(),
            Utc::now(),
        )
    }

    #[test]
    fn place_seeds_history_and_totals() {
        let order = place(vec![line(2, 100)]).unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.status_history.len(), 1);
        assert_eq!(order.status_history[0].note, "Order created");
        assert_eq!(order.total(), Money::from_major(276));
        assert!(order.totals.is_consistent());
        assert_eq!(order.billing_address, order.shipping_address);
        assert!(order.history_is_consistent());
    }

    #[test]
    fn place_validates_input() {
        assert!(matches!(place(vec![]), Err(OrderError::EmptyOrder)));
        assert!(matches!(
            place(vec![line(0, 100)]),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));

        let mut cmd = PlaceOrder::new(UserId::new(), vec![line(1, 10)], address(), PaymentMethod::Paypal);
        cmd.notes = Some("x".repeat(MAX_NOTES_LEN + 1));
        let result = Order::place(cmd, "GF1".into(), &CommerceSettings::default(), Utc::now());
        assert!(matches!(result, Err(OrderError::NotesTooLong { .. })));

        let mut cmd = PlaceOrder::new(UserId::new(), vec![line(1, 10)], address(), PaymentMethod::Paypal);
        cmd.gift_message = Some("x".repeat(MAX_GIFT_MESSAGE_LEN + 1));
        let result = Order::place(cmd, "GF1".into(), &CommerceSettings::default(), Utc::now());
        assert!(matches!(result, Err(OrderError::GiftMessageTooLong { .. })));
    }

    #[test]
    fn same_status_is_a_no_op() {
        let settings = CommerceSettings::default();
        let mut order = place(vec![line(1, 100)]).unwrap();

        assert!(!order.apply_status_change(&StatusChange::to(OrderStatus::Pending), &settings, Utc::now()));
        assert_eq!(order.status_history.len(), 1);
    }

    #[test]
    fn shipping_sets_tracking_and_eta() {
        let settings = CommerceSettings::default();
        let mut order = place(vec![line(1, 100)]).unwrap();
        let now = Utc::now();

        assert!(order.apply_status_change(&StatusChange::to(OrderStatus::Shipped), &settings, now));

        let tracking = order.tracking_number.clone().unwrap();
        assert_eq!(tracking.len(), 13);
        assert_eq!(order.estimated_delivery, Some(now + Duration::days(7)));
        assert_eq!(
            order.status_history.last().map(|e| e.note.as_str()),
            Some("Status updated to shipped")
        );
        assert!(order.history_is_consistent());
    }

    #[test]
    fn supplied_tracking_number_wins() {
        let settings = CommerceSettings::default();
        let mut order = place(vec![line(1, 100)]).unwrap();

        let change = StatusChange::to(OrderStatus::Shipped).with_tracking_number("DHL-1");
        order.apply_status_change(&change, &settings, Utc::now());
        assert_eq!(order.tracking_number.as_deref(), Some("DHL-1"));

        // same status with a new tracking number is still recorded
        let change = StatusChange::to(OrderStatus::Shipped).with_tracking_number("DHL-2");
        assert!(order.apply_status_change(&change, &settings, Utc::now()));
        assert_eq!(order.status_history.len(), 3);
    }

    #[test]
    fn payment_confirmation_moves_pending_to_processing() {
        let mut order = place(vec![line(1, 100)]).unwrap();
        let confirmation = PaymentConfirmation {
            payment_id: "pi_1".into(),
            succeeded: true,
            email: Some("a@b.c".into()),
            update_time: None,
        };

        assert!(order.confirm_payment(&confirmation, Utc::now()));
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(
            order.status_history.last().map(|e| e.note.as_str()),
            Some("Payment confirmed")
        );

        // replaying the callback changes nothing
        assert!(!order.confirm_payment(&confirmation, Utc::now()));
        assert_eq!(order.status_history.len(), 2);
    }

    #[test]
    fn failed_payment_keeps_status() {
        let mut order = place(vec![line(1, 100)]).unwrap();
        let confirmation = PaymentConfirmation {
            payment_id: "pi_1".into(),
            succeeded: false,
            email: None,
            update_time: None,
        };
        assert!(order.confirm_payment(&confirmation, Utc::now()));
        assert_eq!(order.payment_status, PaymentStatus::Failed);
        assert_eq!(order.status, OrderStatus::Pending);
    }
}
