//! Monetary breakdown shared by carts and orders.

use common::Money;
use serde::{Deserialize, Serialize};

use crate::cart::Coupon;
use crate::settings::CommerceSettings;

/// Subtotal, discount, tax, shipping and grand total.
///
/// Always produced by [`Totals::compute`]; `total` is never set by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub shipping: Money,
    pub total: Money,
}

impl Totals {
    /// Prices a set of (unit price, quantity) lines.
    ///
    /// Tax and the free-shipping threshold use the undiscounted subtotal; the
    /// discount is taken off the subtotal before tax and shipping are added.
    pub fn compute<I>(lines: I, coupon: Option<&Coupon>, settings: &CommerceSettings) -> Self
    where
        I: IntoIterator<Item = (Money, u32)>,
    {
        let subtotal: Money = lines
            .into_iter()
            .map(|(price, quantity)| price.multiply(quantity))
            .sum();
        let discount = coupon
            .map(|c| c.discount_for(subtotal))
            .unwrap_or_default();
        let tax = settings.tax_for(subtotal);
        let shipping = settings.shipping_for(subtotal);

        Self {
            subtotal,
            discount,
            tax,
            shipping,
            total: subtotal - discount + tax + shipping,
        }
    }

    /// Returns true if `total` matches its components.
    pub fn is_consistent(&self) -> bool {
        self.total == self.subtotal - self.discount + self.tax + self.shipping
    }
}
