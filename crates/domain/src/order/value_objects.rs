//! Value objects embedded in an order.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderStatus};
use crate::cart::CartLine;

fn default_country() -> String {
    "United States".to_string()
}

/// A postal address. `phone` is required on shipping addresses only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Address {
    /// Checks the required fields. Shipping addresses also need a phone number.
    pub fn validate(&self, require_phone: bool) -> Result<(), OrderError> {
        let fields = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("zip_code", &self.zip_code),
            ("country", &self.country),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(OrderError::MissingAddressField(*name));
        }
        if require_phone && self.phone.as_deref().is_none_or(|p| p.trim().is_empty()) {
            return Err(OrderError::MissingAddressField("phone"));
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A frozen line item. Never changes after the order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: u32,
    pub size: String,
    pub color: Option<String>,
    pub image: Option<String>,
}

impl OrderLine {
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id,
            name: line.name.clone(),
            price: line.price,
            quantity: line.quantity,
            size: line.size.clone(),
            color: line.color.clone(),
            image: line.image.clone(),
        }
    }
}

/// What the payment provider reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub id: String,
    pub status: String,
    pub update_time: String,
    pub email_address: Option<String>,
}

/// One entry of the append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub note: String,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Option<UserId>,
}
