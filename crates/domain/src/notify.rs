//! Email notification contract.
//!
//! Delivery itself is an external concern. The domain hands a [`Notification`]
//! to a [`Notifier`] through a [`Dispatcher`], which logs and swallows every
//! failure so that a broken mail relay never fails an order or stock operation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Email templates the storefront sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    OrderConfirmation,
    OrderShipped,
    OrderDelivered,
    LowStock,
    OutOfStock,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::OrderConfirmation => "order_confirmation",
            Template::OrderShipped => "order_shipped",
            Template::OrderDelivered => "order_delivered",
            Template::LowStock => "low_stock",
            Template::OutOfStock => "out_of_stock",
        }
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub order_number: String,
    pub status: String,
    pub total: Money,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    pub stock: u32,
}

/// Data a template is rendered with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContext {
    pub recipient_name: Option<String>,
    pub order: Option<OrderSummary>,
    pub product: Option<ProductSummary>,
}

/// A message for the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub to: String,
    pub template: Template,
    pub context: NotificationContext,
}

impl Notification {
    /// Subject line for the message.
    pub fn subject(&self) -> String {
        let order_number = self
            .context
            .order
            .as_ref()
            .map(|o| o.order_number.as_str())
            .unwrap_or_default();
        let product_name = self
            .context
            .product
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or_default();
        match self.template {
            Template::OrderConfirmation => format!("Order Confirmation - {order_number}"),
            Template::OrderShipped => format!("Your Order Has Shipped - {order_number}"),
            Template::OrderDelivered => format!("Order Delivered - {order_number}"),
            Template::LowStock => format!("Low Stock Alert - {product_name}"),
            Template::OutOfStock => format!("Out of Stock - {product_name}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Sends notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Notifier that writes each message to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if !notification.to.contains('@') {
            return Err(NotifyError::InvalidRecipient(notification.to));
        }
        tracing::info!(
            to = %notification.to,
            template = %notification.template,
            subject = %notification.subject(),
            "email notification"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<Notification>,
    fail: bool,
}

/// Notifier that records messages, for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<Mutex<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent send fail.
    pub fn set_fail(&self, fail: bool) {
        self.lock().fail = fail;
    }

    /// Returns the messages sent so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.lock().sent.clone()
    }

    /// Returns the messages sent with a given template.
    pub fn sent_with(&self, template: Template) -> Vec<Notification> {
        self.lock()
            .sent
            .iter()
            .filter(|n| n.template == template)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryNotifierState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        let mut state = self.lock();
        if state.fail {
            return Err(NotifyError::Delivery("smtp unavailable".to_string()));
        }
        state.sent.push(notification);
        Ok(())
    }
}

/// Fire-and-forget front for a [`Notifier`].
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Sends a notification; failures are logged and dropped.
    pub async fn dispatch(&self, notification: Notification) {
        let template = notification.template;
        let to = notification.to.clone();
        if let Err(e) = self.notifier.notify(notification).await {
            metrics::counter!("notifications_failed_total", "template" => template.as_str())
                .increment(1);
            tracing::warn!(error = %e, %to, %template, "notification failed");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}
