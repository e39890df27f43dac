//! Order service: creation, the status lifecycle and order reads.

use std::sync::Arc;

use chrono::Utc;
use common::{OrderId, UserId};
use document_store::{DocumentStore, SortKey, StoreError};

use crate::error::DomainError;
use crate::inventory::InventoryService;
use crate::notify::{Dispatcher, Notification, NotificationContext, Template};
use crate::pagination::{Page, PageRequest};
use crate::repository::{Outcome, Repository};
use crate::settings::{CommerceSettings, StockPolicy};
use crate::user::User;

use super::{
    BulkOutcome, Order, OrderFilter, OrderHistory, OrderStatus, PaymentConfirmation, PlaceOrder,
    ShippingLabel, StatusChange, TrackingView, numbers,
};

/// Who is asking for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Caller {
    fn may_view(&self, order: &Order) -> bool {
        self.is_admin || order.user_id == self.user_id
    }
}

/// Result of a status transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order: Order,
    /// False when the order was already in the requested state.
    pub changed: bool,
    pub previous: OrderStatus,
}

/// Stock side effects decided inside a transition.
#[derive(Debug, Clone, Copy)]
struct StockEffects {
    previous: OrderStatus,
    claimed: bool,
    release: bool,
}

/// Service for managing orders.
///
/// Every write goes through the repository's compare-and-swap loop, so
/// concurrent transitions of one order are applied one after another.
pub struct OrderService<S: DocumentStore> {
    orders: Repository<S, Order>,
    users: Repository<S, User>,
    inventory: InventoryService<S>,
    dispatcher: Dispatcher,
    settings: Arc<CommerceSettings>,
}

impl<S: DocumentStore + Clone> OrderService<S> {
    pub fn new(
        store: S,
        inventory: InventoryService<S>,
        dispatcher: Dispatcher,
        settings: Arc<CommerceSettings>,
    ) -> Self {
        Self {
            orders: Repository::new(store.clone(), settings.write_retries),
            users: Repository::new(store, settings.write_retries),
            inventory,
            dispatcher,
            settings,
        }
    }
}

impl<S: DocumentStore> OrderService<S> {
    pub fn settings(&self) -> &CommerceSettings {
        &self.settings
    }

    /// Records a new pending order and sends the confirmation email.
    ///
    /// Under [`StockPolicy::ReserveOnCreate`] the stock is taken here unless
    /// the caller already did.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id, lines = cmd.lines.len()))]
    pub async fn create_order(&self, mut cmd: PlaceOrder) -> Result<Order, DomainError> {
        let now = Utc::now();
        let reserve_here =
            self.settings.stock_policy == StockPolicy::ReserveOnCreate && !cmd.stock_reserved;
        cmd.stock_reserved = cmd.stock_reserved || reserve_here;

        let mut order = Order::place(cmd, numbers::order_number(now), &self.settings, now)?;
        let lines = order.stock_lines();
        if reserve_here {
            self.inventory.reserve_all(&lines).await?;
        }

        let mut attempt = 0;
        let order = loop {
            attempt += 1;
            match self.orders.insert(order.clone()).await {
                Ok(stored) => break stored,
                Err(DomainError::Store(StoreError::DuplicateKey { ref key, .. }))
                    if key == "order_number" && attempt < self.settings.write_retries.max(1) =>
                {
                    tracing::debug!(order_number = %order.order_number, attempt, "order number taken, retrying");
                    order.order_number = numbers::order_number(now);
                }
                Err(e) => {
                    if reserve_here {
                        self.inventory.release_all(&lines).await;
                    }
                    return Err(match e {
                        DomainError::Store(StoreError::DuplicateKey { .. }) => {
                            DomainError::Conflict("could not allocate an order number".to_string())
                        }
                        other => other,
                    });
                }
            }
        };

        metrics::counter!("orders_created_total", "payment_method" => order.payment_method.as_str())
            .increment(1);
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total(),
            "order created"
        );
        self.notify_owner(&order, Template::OrderConfirmation).await;
        Ok(order)
    }

    /// Moves an order to a status, with stock reconciliation and notifications.
    ///
    /// Admins may set any status; a change to the current status with no new
    /// tracking number or shipping method does nothing.
    #[tracing::instrument(skip(self, change), fields(to = %change.status))]
    pub async fn transition_status(
        &self,
        order_id: OrderId,
        change: StatusChange,
    ) -> Result<TransitionOutcome, DomainError> {
        let current = self.orders.load_required(order_id.as_uuid()).await?;
        let lines = current.stock_lines();

        // Stock is taken when an unshipped order first ships, or when a
        // cancelled order is reactivated under reserve-on-create.
        let takes_stock = match self.settings.stock_policy {
            StockPolicy::ReserveOnShip => change.status == OrderStatus::Shipped,
            StockPolicy::ReserveOnCreate => {
                current.status == OrderStatus::Cancelled && change.status != OrderStatus::Cancelled
            }
            StockPolicy::Manual => false,
        };
        let reserved_now = takes_stock && !current.stock_reserved && !current.ever_shipped();
        if reserved_now {
            self.inventory.reserve_all(&lines).await?;
        }

        let now = Utc::now();
        let settings = &self.settings;
        let result = self
            .orders
            .update(order_id.as_uuid(), |order| {
                let previous = order.status;
                let shipped_before = order.ever_shipped();
                if !order.apply_status_change(&change, settings, now) {
                    return Ok(Outcome::Unchanged(StockEffects {
                        previous,
                        claimed: false,
                        release: false,
                    }));
                }
                let claimed = reserved_now && !order.stock_reserved;
                if claimed {
                    order.stock_reserved = true;
                }
                let release = order.status == OrderStatus::Cancelled
                    && order.stock_reserved
                    && !shipped_before;
                if release {
                    order.stock_reserved = false;
                }
                Ok(Outcome::Changed(StockEffects {
                    previous,
                    claimed,
                    release,
                }))
            })
            .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                if reserved_now {
                    self.inventory.release_all(&lines).await;
                }
                return Err(e);
            }
        };
        let effects = result.value;
        let order = result.aggregate;

        if reserved_now && !effects.claimed {
            self.inventory.release_all(&lines).await;
        }
        if effects.release {
            self.inventory.release_all(&order.stock_lines()).await;
        }

        if result.changed {
            metrics::counter!(
                "order_status_transitions_total",
                "from" => effects.previous.as_str(),
                "to" => order.status.as_str()
            )
            .increment(1);
            tracing::info!(
                order_id = %order.id,
                order_number = %order.order_number,
                from = %effects.previous,
                to = %order.status,
                actor = ?change.actor,
                "order status changed"
            );
            if effects.previous != order.status {
                match order.status {
                    OrderStatus::Shipped => self.notify_owner(&order, Template::OrderShipped).await,
                    OrderStatus::Delivered => {
                        self.notify_owner(&order, Template::OrderDelivered).await
                    }
                    _ => {}
                }
            }
        }

        Ok(TransitionOutcome {
            order,
            changed: result.changed,
            previous: effects.previous,
        })
    }

    /// Applies one status to many orders independently. Outcomes follow the
    /// input order.
    #[tracing::instrument(skip(self, order_ids, note), fields(count = order_ids.len()))]
    pub async fn bulk_transition(
        &self,
        order_ids: Vec<OrderId>,
        status: OrderStatus,
        note: Option<String>,
        actor: Option<UserId>,
    ) -> Vec<BulkOutcome> {
        let note = note
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Bulk status update to {status}"));

        let mut outcomes = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            let change = StatusChange {
                status,
                note: Some(note.clone()),
                actor,
                tracking_number: None,
                shipping_method: None,
            };
            let outcome = match self.transition_status(order_id, change).await {
                Ok(outcome) => BulkOutcome {
                    order_id,
                    success: true,
                    status: Some(outcome.order.status),
                    error_kind: None,
                    message: None,
                },
                Err(e) => BulkOutcome {
                    order_id,
                    success: false,
                    status: None,
                    error_kind: Some(e.kind()),
                    message: Some(e.to_string()),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Records the payment provider's callback.
    #[tracing::instrument(skip(self, confirmation), fields(succeeded = confirmation.succeeded))]
    pub async fn confirm_payment(
        &self,
        order_id: OrderId,
        confirmation: PaymentConfirmation,
    ) -> Result<Order, DomainError> {
        let now = Utc::now();
        let result = self
            .orders
            .update(order_id.as_uuid(), |order| {
                let previous = order.status;
                if order.confirm_payment(&confirmation, now) {
                    Ok(Outcome::Changed(previous))
                } else {
                    Ok(Outcome::Unchanged(previous))
                }
            })
            .await?;

        let order = result.aggregate;
        if result.changed && result.value != order.status {
            metrics::counter!(
                "order_status_transitions_total",
                "from" => result.value.as_str(),
                "to" => order.status.as_str()
            )
            .increment(1);
            tracing::info!(order_id = %order.id, from = %result.value, to = %order.status, "payment confirmed");
        }
        Ok(order)
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.orders.load_required(order_id.as_uuid()).await
    }

    /// Loads an order the caller owns, or any order for an admin.
    pub async fn get_for(&self, order_id: OrderId, caller: Caller) -> Result<Order, DomainError> {
        let order = self.get(order_id).await?;
        if !caller.may_view(&order) {
            return Err(DomainError::Forbidden(
                "not authorized to view this order".to_string(),
            ));
        }
        Ok(order)
    }

    pub async fn find_by_order_number(&self, order_number: &str) -> Result<Order, DomainError> {
        let order_number = order_number.trim();
        self.orders
            .find_by_key("order_number", order_number)
            .await?
            .ok_or_else(|| DomainError::not_found("Order", order_number))
    }

    /// Status history, oldest first.
    pub async fn history(&self, order_id: OrderId) -> Result<OrderHistory, DomainError> {
        let order = self.get(order_id).await?;
        Ok(OrderHistory {
            order_number: order.order_number,
            history: order.status_history,
        })
    }

    /// The user's orders, newest first.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, DomainError> {
        let mut query = self.orders.all().eq("user_id", user_id.to_string());
        if let Some(status) = status {
            query = query.eq("status", status.as_str());
        }
        let query = query
            .sort_by(SortKey::CreatedAt, true)
            .page(page.page, page.limit);
        let (items, total) = self.orders.query_page(query).await?;
        Ok(Page::new(items, page, total))
    }

    /// Admin listing with filters, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn admin_list(&self, filter: OrderFilter) -> Result<Page<Order>, DomainError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to)
            && from > to
        {
            return Err(DomainError::InvalidArgument(
                "'from' must not be after 'to'".to_string(),
            ));
        }
        let mut query = self
            .orders
            .all()
            .created_between(filter.from, filter.to);
        if let Some(status) = filter.status {
            query = query.eq("status", status.as_str());
        }
        if let Some(payment_status) = filter.payment_status {
            query = query.eq("payment_status", payment_status.as_str());
        }
        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            query = query.search(
                &[
                    "order_number",
                    "shipping_address.first_name",
                    "shipping_address.last_name",
                    "shipping_address.phone",
                ],
                q,
            );
        }
        let query = query
            .sort_by(SortKey::CreatedAt, true)
            .page(filter.page.page, filter.page.limit);
        let (items, total) = self.orders.query_page(query).await?;
        Ok(Page::new(items, filter.page, total))
    }

    /// Tracking view by order number. Anonymous lookups are allowed; a
    /// signed-in caller must own the order or be an admin.
    pub async fn tracking(
        &self,
        order_number: &str,
        caller: Option<Caller>,
    ) -> Result<TrackingView, DomainError> {
        let order = self.find_by_order_number(order_number).await?;
        if let Some(caller) = caller
            && !caller.may_view(&order)
        {
            return Err(DomainError::Forbidden("access denied".to_string()));
        }
        Ok(TrackingView::from(order))
    }

    /// Shipping-label payload for printing.
    pub async fn label(&self, order_id: OrderId) -> Result<ShippingLabel, DomainError> {
        let order = self.get(order_id).await?;
        Ok(ShippingLabel::for_order(order, Utc::now()))
    }

    /// Emails the order's owner. A missing user skips the message.
    async fn notify_owner(&self, order: &Order, template: Template) {
        let user = match self.users.load(order.user_id.as_uuid()).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(order_id = %order.id, user_id = %order.user_id, %template, "order owner not found, skipping notification");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, order_id = %order.id, %template, "failed to load order owner");
                return;
            }
        };
        self.dispatcher
            .dispatch(Notification {
                to: user.email,
                template,
                context: NotificationContext {
                    recipient_name: Some(user.name),
                    order: Some(order.summary()),
                    product: None,
                },
            })
            .await;
    }
}
