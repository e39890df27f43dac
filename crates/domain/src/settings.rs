//! Commerce settings shared by pricing, inventory and the order lifecycle.

use common::{Money, Rate};
use serde::{Deserialize, Serialize};

/// When stock is taken out of the catalog for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Stock only moves through explicit inventory operations.
    #[default]
    Manual,
    /// Stock is reserved at checkout, before the payment is charged.
    ReserveOnCreate,
    /// Stock is reserved when the order is marked shipped.
    ReserveOnShip,
}

impl StockPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockPolicy::Manual => "manual",
            StockPolicy::ReserveOnCreate => "reserve_on_create",
            StockPolicy::ReserveOnShip => "reserve_on_ship",
        }
    }
}

impl std::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" | "manual_only" => Ok(StockPolicy::Manual),
            "reserve_on_create" => Ok(StockPolicy::ReserveOnCreate),
            "reserve_on_ship" => Ok(StockPolicy::ReserveOnShip),
            other => Err(format!("unknown stock policy '{other}'")),
        }
    }
}

/// Rates, thresholds and policies of the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommerceSettings {
    /// Tax applied to the cart and order subtotal.
    pub tax_rate: Rate,

    /// Subtotals strictly above this ship for free.
    pub free_shipping_threshold: Money,

    /// Shipping charged at or below the threshold.
    pub flat_shipping_fee: Money,

    /// Upper bound for the quantity of a single cart line.
    pub max_line_quantity: u32,

    /// Stock at or below this (and above zero) counts as low.
    pub low_stock_threshold: u32,

    /// Days added to the ship date for the delivery estimate.
    pub estimated_delivery_days: i64,

    pub stock_policy: StockPolicy,

    /// Recipient of stock alerts.
    pub admin_email: String,

    /// Attempts for a read-modify-write cycle before giving up.
    pub write_retries: u32,
}

impl Default for CommerceSettings {
    fn default() -> Self {
        Self {
            tax_rate: Rate::from_percent(18),
            free_shipping_threshold: Money::from_major(999),
            flat_shipping_fee: Money::from_major(40),
            max_line_quantity: 10,
            low_stock_threshold: 10,
            estimated_delivery_days: 7,
            stock_policy: StockPolicy::Manual,
            admin_email: "admin@gfresh.com".to_string(),
            write_retries: 8,
        }
    }
}

impl CommerceSettings {
    /// Shipping charge for a subtotal. Empty carts ship free.
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal.is_zero() || subtotal > self.free_shipping_threshold {
            Money::zero()
        } else {
            self.flat_shipping_fee
        }
    }

    pub fn tax_for(&self, subtotal: Money) -> Money {
        subtotal.apply_rate(self.tax_rate)
    }
}
