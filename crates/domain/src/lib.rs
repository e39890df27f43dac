//! Domain layer for the storefront.
//!
//! This crate provides:
//! - the `Aggregate` trait and a `Repository` with optimistic concurrency
//! - catalog products and the cart aggregate with pricing and coupons
//! - the inventory manager (stock adjustments, reservations, alerts)
//! - the order lifecycle (creation, status transitions, history, tracking)
//! - users and the notification dispatcher

pub mod aggregate;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod inventory;
pub mod notify;
pub mod order;
pub mod pagination;
pub mod pricing;
pub mod repository;
pub mod settings;
pub mod user;

pub use aggregate::Aggregate;
pub use cart::{
    AddToCart, Cart, CartError, CartLine, CartService, Coupon, CouponRegistry, Discount,
    StaticCouponRegistry,
};
pub use catalog::{CatalogService, Category, NewProduct, Product, ProductFilter, ProductPatch};
pub use error::DomainError;
pub use inventory::{
    BulkAdjustReport, InventoryFilter, InventoryOverview, InventoryService, InventoryStats,
    StockAdjustment, StockChange, StockOperation, StockSignal,
};
pub use notify::{Dispatcher, InMemoryNotifier, LogNotifier, Notification, Notifier, Template};
pub use order::{
    Address, Caller, Order, OrderError, OrderFilter, OrderLine, OrderService, OrderStatus,
    PaymentConfirmation, PaymentMethod, PaymentStatus, PlaceOrder, ShippingMethod, StatusChange,
    TransitionOutcome,
};
pub use pagination::{Page, PageRequest, Pagination};
pub use pricing::Totals;
pub use repository::{Outcome, Repository, UpdateResult};
pub use settings::{CommerceSettings, StockPolicy};
pub use user::{NewUser, Role, User, UserService};
