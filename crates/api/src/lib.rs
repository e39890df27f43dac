//! HTTP API server for the storefront.
//!
//! Exposes the catalog, cart, checkout, order lifecycle, inventory and
//! reporting services over REST, with bearer-token sessions, structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod session;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use document_store::DocumentStore;
use domain::CommerceSettings;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use session::{AdminSession, InMemorySessions, Session, SessionResolver};
pub use state::{AppState, Collaborators};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{admin_orders, cart, health, inventory, orders, products, reports, users};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(health::check))
        // catalog
        .route("/products", get(products::list::<S>))
        .route("/products/{id}", get(products::get::<S>))
        .route("/admin/products", post(products::create::<S>))
        .route(
            "/admin/products/{id}",
            patch(products::update::<S>).delete(products::deactivate::<S>),
        )
        // cart
        .route("/cart", get(cart::get::<S>).delete(cart::clear::<S>))
        .route("/cart/items", post(cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(cart::update_quantity::<S>).delete(cart::remove_item::<S>),
        )
        .route(
            "/cart/coupon",
            post(cart::apply_coupon::<S>).delete(cart::remove_coupon::<S>),
        )
        // orders
        .route("/orders", post(orders::checkout::<S>))
        .route("/orders/mine", get(orders::mine::<S>))
        .route("/orders/{id}", get(orders::get::<S>))
        .route("/payments/confirm", post(orders::confirm_payment::<S>))
        .route("/tracking/order/{order_number}", get(orders::tracking::<S>))
        // admin orders
        .route("/admin/orders", get(admin_orders::list::<S>))
        .route("/admin/orders/bulk-status", put(admin_orders::bulk_status::<S>))
        .route("/admin/orders/{id}/status", patch(admin_orders::update_status::<S>))
        .route("/admin/orders/{id}/history", get(admin_orders::history::<S>))
        .route("/admin/orders/{id}/label", get(admin_orders::label::<S>))
        // reporting and users
        .route("/admin/reports/sales", get(reports::sales::<S>))
        .route("/admin/analytics", get(reports::analytics::<S>))
        .route("/admin/users", get(users::list::<S>))
        .route("/admin/users/{id}/active", patch(users::set_active::<S>))
        // inventory
        .route("/inventory/stock/bulk", put(inventory::bulk_adjust::<S>))
        .route("/inventory/stock/{product_id}", put(inventory::adjust::<S>))
        .route("/inventory/low-stock", get(inventory::low_stock::<S>))
        .route("/inventory/overview", get(inventory::overview::<S>))
        .route_layer(axum::middleware::from_fn(middleware::track_metrics))
        .fallback(routes::not_found)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state with injected collaborators.
pub fn create_state<S: DocumentStore + Clone + 'static>(
    store: S,
    settings: CommerceSettings,
    collaborators: Collaborators,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, settings, collaborators))
}

/// Creates the application state with the log notifier, in-memory sessions
/// and the in-memory payment gateway.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    settings: CommerceSettings,
) -> Arc<AppState<S>> {
    create_state(store, settings, Collaborators::default())
}
