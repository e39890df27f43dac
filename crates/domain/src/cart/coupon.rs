use std::collections::HashMap;

use async_trait::async_trait;
use common::{Money, Rate};
use serde::{Deserialize, Serialize};

/// How a coupon reduces the subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    Percentage(Rate),
    Fixed(Money),
}

/// A named discount rule with a minimum-subtotal gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount: Discount,
    pub minimum: Money,
}

impl Coupon {
    pub fn new(code: impl Into<String>, discount: Discount, minimum: Money) -> Self {
        Self {
            code: normalize_code(&code.into()),
            discount,
            minimum,
        }
    }

    pub fn is_eligible(&self, subtotal: Money) -> bool {
        subtotal >= self.minimum
    }

    /// Discount for a subtotal, never more than the subtotal itself.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        let raw = match self.discount {
            Discount::Percentage(rate) => subtotal.apply_rate(rate),
            Discount::Fixed(amount) => amount,
        };
        raw.clamp(Money::zero(), subtotal.max(Money::zero()))
    }
}

/// Canonical form of a coupon code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Looks up coupons by code.
#[async_trait]
pub trait CouponRegistry: Send + Sync {
    /// Returns the coupon for a normalized code, if any.
    async fn lookup(&self, code: &str) -> Option<Coupon>;
}

/// Coupon registry backed by a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticCouponRegistry {
    coupons: HashMap<String, Coupon>,
}

impl StaticCouponRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the storefront's standing promotions.
    pub fn with_defaults() -> Self {
        Self::new()
            .with(Coupon::new(
                "WELCOME10",
                Discount::Percentage(Rate::from_percent(10)),
                Money::from_major(50),
            ))
            .with(Coupon::new(
                "SAVE20",
                Discount::Percentage(Rate::from_percent(20)),
                Money::from_major(100),
            ))
            .with(Coupon::new(
                "FLAT5",
                Discount::Fixed(Money::from_major(5)),
                Money::from_major(25),
            ))
    }

    pub fn with(mut self, coupon: Coupon) -> Self {
        self.coupons.insert(coupon.code.clone(), coupon);
        self
    }
}

#[async_trait]
impl CouponRegistry for StaticCouponRegistry {
    async fn lookup(&self, code: &str) -> Option<Coupon> {
        self.coupons.get(&normalize_code(code)).cloned()
    }
}
