//! Checkout coordinator with compensating steps.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{ProductId, UserId};
use document_store::DocumentStore;
use domain::{
    AddToCart, CartError, CartService, CatalogService, CommerceSettings, Coupon, CouponRegistry,
    Dispatcher, DomainError, InventoryService, Order, OrderLine, OrderService, PaymentStatus,
    PlaceOrder, StockPolicy, UserService,
};
use domain::order::PaymentResult;

use crate::error::{CheckoutError, Result};
use crate::payment::{Charge, ChargeRequest, PaymentGateway};
use crate::request::{CheckoutRequest, CheckoutSource};
use crate::state::CheckoutState;

/// Tracks the state of one checkout for logging.
struct Progress {
    user_id: UserId,
    state: CheckoutState,
}

impl Progress {
    fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            state: CheckoutState::Started,
        }
    }

    fn advance(&mut self, next: CheckoutState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "checkout cannot move from {} to {}",
            self.state,
            next
        );
        tracing::debug!(user_id = %self.user_id, from = %self.state, to = %next, "checkout step");
        self.state = next;
    }
}

/// Turns a cart or buy-now list into a paid, recorded order.
///
/// The steps are not one transaction. A failure after stock was taken or a
/// charge captured undoes those steps before the error is returned.
pub struct CheckoutCoordinator<S, P>
where
    S: DocumentStore,
    P: PaymentGateway,
{
    carts: CartService<S>,
    catalog: CatalogService<S>,
    inventory: InventoryService<S>,
    orders: OrderService<S>,
    users: UserService<S>,
    payments: P,
    settings: Arc<CommerceSettings>,
}

impl<S, P> CheckoutCoordinator<S, P>
where
    S: DocumentStore + Clone,
    P: PaymentGateway,
{
    pub fn new(
        store: S,
        dispatcher: Dispatcher,
        coupons: Arc<dyn CouponRegistry>,
        settings: Arc<CommerceSettings>,
        payments: P,
    ) -> Self {
        let inventory = InventoryService::new(store.clone(), dispatcher.clone(), settings.clone());
        Self {
            carts: CartService::new(store.clone(), coupons, settings.clone()),
            catalog: CatalogService::new(store.clone(), settings.write_retries),
            orders: OrderService::new(store.clone(), inventory.clone(), dispatcher, settings.clone()),
            users: UserService::new(store, settings.write_retries),
            inventory,
            payments,
            settings,
        }
    }
}

impl<S, P> CheckoutCoordinator<S, P>
where
    S: DocumentStore,
    P: PaymentGateway,
{
    pub fn payments(&self) -> &P {
        &self.payments
    }

    /// Runs a checkout for `user_id`.
    #[tracing::instrument(skip(self, request), fields(payment_method = request.payment_method.as_str()))]
    pub async fn checkout(&self, user_id: UserId, request: CheckoutRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.run(user_id, request).await;

        let outcome = match &result {
            Ok(_) => "completed",
            Err(e) => e.outcome(),
        };
        metrics::counter!("checkout_total", "outcome" => outcome).increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        if let Err(ref e) = result {
            tracing::warn!(%user_id, error = %e, outcome, "checkout failed");
        }
        result
    }

    async fn run(&self, user_id: UserId, request: CheckoutRequest) -> Result<Order> {
        let mut progress = Progress::new(user_id);

        let (lines, coupon) = self.snapshot(user_id, &request.source).await?;
        let mut cmd = PlaceOrder::new(
            user_id,
            lines,
            request.shipping_address.clone(),
            request.payment_method,
        );
        cmd.coupon = coupon;
        request.apply_details(&mut cmd);

        // Validates and prices the order before anything is held.
        let quote = Order::place(cmd.clone(), String::new(), &self.settings, Utc::now())
            .map_err(DomainError::from)?;
        let stock_lines = quote.stock_lines();
        let email = self.users.find(user_id).await?.map(|u| u.email);

        if self.settings.stock_policy == StockPolicy::ReserveOnCreate {
            self.inventory.reserve_all(&stock_lines).await?;
            cmd.stock_reserved = true;
            progress.advance(CheckoutState::StockReserved);
        }

        let mut charge = None;
        if !request.payment_method.is_collected_on_delivery() {
            let charged = self
                .payments
                .charge(ChargeRequest {
                    user_id,
                    amount: quote.total(),
                    method: request.payment_method,
                    email,
                })
                .await;
            match charged {
                Ok(captured) => {
                    cmd.payment_status = PaymentStatus::Paid;
                    cmd.payment_result = Some(PaymentResult {
                        id: captured.payment_id.clone(),
                        status: "succeeded".to_string(),
                        update_time: captured.captured_at.to_rfc3339(),
                        email_address: captured.email.clone(),
                    });
                    progress.advance(CheckoutState::PaymentCaptured);
                    charge = Some(captured);
                }
                Err(e) => {
                    self.compensate(&mut progress, &stock_lines, cmd.stock_reserved, None)
                        .await;
                    return Err(CheckoutError::PaymentDeclined {
                        reason: e.to_string(),
                    });
                }
            }
        }

        let release = cmd.stock_reserved;
        let order = match self.orders.create_order(cmd).await {
            Ok(order) => order,
            Err(e) => {
                self.compensate(&mut progress, &stock_lines, release, charge.as_ref())
                    .await;
                return Err(e.into());
            }
        };
        progress.advance(CheckoutState::OrderPlaced);

        if matches!(request.source, CheckoutSource::Cart)
            && let Err(e) = self.carts.clear(user_id).await
        {
            tracing::warn!(%user_id, order_id = %order.id, error = %e, "failed to clear cart after checkout");
        }
        progress.advance(CheckoutState::Completed);

        tracing::info!(
            %user_id,
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total(),
            "checkout completed"
        );
        Ok(order)
    }

    /// Lines and coupon for the order.
    async fn snapshot(
        &self,
        user_id: UserId,
        source: &CheckoutSource,
    ) -> Result<(Vec<OrderLine>, Option<Coupon>)> {
        match source {
            CheckoutSource::Cart => {
                let cart = self.carts.get(user_id).await?;
                if cart.is_empty() {
                    return Err(DomainError::from(CartError::Empty).into());
                }
                let lines = cart.lines.iter().map(OrderLine::from).collect();
                Ok((lines, cart.coupon))
            }
            CheckoutSource::BuyNow(items) => {
                if items.is_empty() {
                    return Err(DomainError::from(CartError::Empty).into());
                }
                let mut lines = Vec::with_capacity(items.len());
                for item in items {
                    lines.push(self.buy_now_line(item).await?);
                }
                Ok((lines, None))
            }
        }
    }

    /// Prices a buy-now item from the live catalog.
    async fn buy_now_line(&self, item: &AddToCart) -> Result<OrderLine> {
        let max = self.settings.max_line_quantity;
        if item.quantity == 0 || item.quantity > max {
            return Err(DomainError::InvalidArgument(format!(
                "quantity must be between 1 and {max}"
            ))
            .into());
        }
        if item.size.trim().is_empty() {
            return Err(DomainError::InvalidArgument("size is required".to_string()).into());
        }

        let product = self.catalog.get_active(item.product_id).await?;
        if product.stock < item.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                requested: item.quantity,
                available: product.stock,
            }
            .into());
        }
        Ok(OrderLine {
            product_id: product.id,
            image: product.primary_image(),
            name: product.name,
            price: product.price,
            quantity: item.quantity,
            size: item.size.trim().to_string(),
            color: item.color.clone().filter(|c| !c.trim().is_empty()),
        })
    }

    /// Refunds the charge and releases held stock. Failures are logged.
    async fn compensate(
        &self,
        progress: &mut Progress,
        lines: &[(ProductId, u32)],
        release: bool,
        charge: Option<&Charge>,
    ) {
        progress.advance(CheckoutState::Compensating);
        if let Some(charge) = charge {
            match self.payments.refund(&charge.payment_id).await {
                Ok(()) => {
                    tracing::info!(payment_id = %charge.payment_id, amount = %charge.amount, "charge refunded")
                }
                Err(e) => {
                    tracing::error!(payment_id = %charge.payment_id, error = %e, "refund failed, manual follow-up needed")
                }
            }
        }
        if release {
            self.inventory.release_all(lines).await;
        }
        progress.advance(CheckoutState::Failed);
    }
}
