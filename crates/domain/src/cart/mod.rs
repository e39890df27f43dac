//! Shopping cart aggregate, coupons and the cart service.

mod coupon;
mod model;
mod service;

pub use coupon::{Coupon, CouponRegistry, Discount, StaticCouponRegistry};
pub use model::{Cart, CartLine};
pub use service::{AddToCart, CartService};

use common::{Money, ProductId};
use thiserror::Error;

/// Errors raised by cart rules.
#[derive(Debug, Error)]
pub enum CartError {
    /// The coupon code is not known.
    #[error("Invalid coupon code: {code}")]
    InvalidCoupon { code: String },

    /// The cart subtotal is below the coupon's minimum.
    #[error("Coupon {code} requires a minimum order of {minimum} (subtotal {subtotal})")]
    MinimumNotMet {
        code: String,
        minimum: Money,
        subtotal: Money,
    },

    /// No line matches the product and size.
    #[error("Cart item not found: product {product_id}, size {size}")]
    LineNotFound { product_id: ProductId, size: String },

    /// The cart has no lines.
    #[error("Cart is empty")]
    Empty,
}
