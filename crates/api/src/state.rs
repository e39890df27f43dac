//! Shared application state.

use std::sync::Arc;

use checkout::{CheckoutCoordinator, InMemoryPaymentGateway};
use document_store::DocumentStore;
use domain::{
    CartService, CatalogService, CommerceSettings, CouponRegistry, Dispatcher, InventoryService,
    LogNotifier, Notifier, OrderService, StaticCouponRegistry, UserService,
};
use reporting::ReportService;

use crate::session::{InMemorySessions, SessionResolver};

/// Services accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub catalog: CatalogService<S>,
    pub carts: CartService<S>,
    pub inventory: InventoryService<S>,
    pub orders: OrderService<S>,
    pub users: UserService<S>,
    pub reports: ReportService<S>,
    pub checkout: CheckoutCoordinator<S, InMemoryPaymentGateway>,
    pub sessions: Arc<dyn SessionResolver>,
    pub settings: Arc<CommerceSettings>,
}

/// Collaborators injected into the state.
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub sessions: Arc<dyn SessionResolver>,
    pub payments: InMemoryPaymentGateway,
    pub coupons: Arc<dyn CouponRegistry>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            notifier: Arc::new(LogNotifier),
            sessions: Arc::new(InMemorySessions::new()),
            payments: InMemoryPaymentGateway::new(),
            coupons: Arc::new(StaticCouponRegistry::with_defaults()),
        }
    }
}

impl<S: DocumentStore + Clone> AppState<S> {
    pub fn new(store: S, settings: CommerceSettings, collaborators: Collaborators) -> Self {
        let settings = Arc::new(settings);
        let dispatcher = Dispatcher::new(collaborators.notifier);
        let inventory = InventoryService::new(store.clone(), dispatcher.clone(), settings.clone());

        Self {
            catalog: CatalogService::new(store.clone(), settings.write_retries),
            carts: CartService::new(
                store.clone(),
                collaborators.coupons.clone(),
                settings.clone(),
            ),
            orders: OrderService::new(
                store.clone(),
                inventory.clone(),
                dispatcher.clone(),
                settings.clone(),
            ),
            users: UserService::new(store.clone(), settings.write_retries),
            reports: ReportService::new(store.clone()),
            checkout: CheckoutCoordinator::new(
                store,
                dispatcher,
                collaborators.coupons,
                settings.clone(),
                collaborators.payments,
            ),
            inventory,
            sessions: collaborators.sessions,
            settings,
        }
    }
}
