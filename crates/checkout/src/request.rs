//! Checkout input.

use domain::{AddToCart, Address, PaymentMethod, PlaceOrder, ShippingMethod};
use serde::Deserialize;

/// Where the order lines come from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", content = "items", rename_all = "snake_case")]
pub enum CheckoutSource {
    /// The caller's stored cart, including its coupon.
    #[default]
    Cart,
    /// An explicit list, priced from the live catalog. The cart is left alone.
    BuyNow(Vec<AddToCart>),
}

/// A checkout request from a signed-in user.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub source: CheckoutSource,
    pub shipping_address: Address,
    #[serde(default)]
    pub billing_address: Option<Address>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub shipping_method: ShippingMethod,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_gift: bool,
    #[serde(default)]
    pub gift_message: Option<String>,
}

impl CheckoutRequest {
    /// Checkout of the stored cart.
    pub fn from_cart(shipping_address: Address, payment_method: PaymentMethod) -> Self {
        Self {
            source: CheckoutSource::Cart,
            shipping_address,
            billing_address: None,
            payment_method,
            shipping_method: ShippingMethod::default(),
            notes: None,
            is_gift: false,
            gift_message: None,
        }
    }

    /// Checkout of an explicit item list.
    pub fn buy_now(
        items: Vec<AddToCart>,
        shipping_address: Address,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            source: CheckoutSource::BuyNow(items),
            ..Self::from_cart(shipping_address, payment_method)
        }
    }

    /// Copies the order details onto a command; lines and coupon are set by
    /// the coordinator.
    pub(crate) fn apply_details(&self, cmd: &mut PlaceOrder) {
        cmd.billing_address = self.billing_address.clone();
        cmd.shipping_method = self.shipping_method;
        cmd.notes = self.notes.clone();
        cmd.is_gift = self.is_gift;
        cmd.gift_message = self.gift_message.clone();
    }
}
