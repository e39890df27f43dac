//! Shared types used across the storefront crates.

mod money;
mod types;

pub use money::{Money, Rate};
pub use types::{OrderId, ProductId, UserId};
