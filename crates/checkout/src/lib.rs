//! Checkout coordination for the storefront.
//!
//! A checkout runs these steps:
//! 1. Snapshot the lines (from the cart or a buy-now list)
//! 2. Reserve stock when the policy reserves on creation
//! 3. Charge the payment gateway (skipped for cash on delivery)
//! 4. Record the order
//! 5. Clear the cart
//!
//! If a step fails, earlier steps are compensated: the charge is refunded and
//! reserved stock is released.

pub mod coordinator;
pub mod error;
pub mod payment;
pub mod request;
pub mod state;

pub use coordinator::CheckoutCoordinator;
pub use error::{CheckoutError, Result};
pub use payment::{Charge, ChargeRequest, InMemoryPaymentGateway, PaymentError, PaymentGateway};
pub use request::{CheckoutRequest, CheckoutSource};
pub use state::CheckoutState;
