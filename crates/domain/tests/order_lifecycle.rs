//! Integration tests for the order lifecycle.
//!
//! These tests drive the cart, inventory and order services together over
//! one in-memory store and check the lifecycle invariants end to end.

use std::sync::Arc;

use common::{Money, OrderId, ProductId, UserId};
use document_store::InMemoryDocumentStore;
use domain::{
    AddToCart, Address, CartError, CartService, CatalogService, Category, CommerceSettings,
    Dispatcher, DomainError, InMemoryNotifier, InventoryService, NewProduct, NewUser, Order,
    OrderLine, OrderService, OrderStatus, PaymentMethod, PlaceOrder, ProductPatch, Role,
    StaticCouponRegistry, StatusChange, StockOperation, StockPolicy, Template, UserService,
};

struct Harness {
    catalog: CatalogService<InMemoryDocumentStore>,
    carts: CartService<InMemoryDocumentStore>,
    inventory: InventoryService<InMemoryDocumentStore>,
    orders: OrderService<InMemoryDocumentStore>,
    users: UserService<InMemoryDocumentStore>,
    notifier: InMemoryNotifier,
}

fn harness_with(settings: CommerceSettings) -> Harness {
    let store = InMemoryDocumentStore::new();
    let notifier = InMemoryNotifier::new();
    let dispatcher = Dispatcher::new(Arc::new(notifier.clone()));
    let settings = Arc::new(settings);
    let inventory = InventoryService::new(store.clone(), dispatcher.clone(), settings.clone());

    Harness {
        catalog: CatalogService::new(store.clone(), settings.write_retries),
        carts: CartService::new(
            store.clone(),
            Arc::new(StaticCouponRegistry::with_defaults()),
            settings.clone(),
        ),
        inventory: inventory.clone(),
        orders: OrderService::new(store.clone(), inventory, dispatcher, settings.clone()),
        users: UserService::new(store, settings.write_retries),
        notifier,
    }
}

fn harness() -> Harness {
    harness_with(CommerceSettings::default())
}

fn address() -> Address {
    Address {
        first_name: "Meera".into(),
        last_name: "Iyer".into(),
        address: "4 Park Street".into(),
        city: "Kolkata".into(),
        state: "WB".into(),
        zip_code: "700016".into(),
        country: "India".into(),
        phone: Some("9830012345".into()),
    }
}

impl Harness {
    async fn customer(&self) -> UserId {
        let suffix = UserId::new();
        self.users
            .register(NewUser {
                name: "Meera Iyer".into(),
                email: format!("meera+{suffix}@example.com"),
                phone: None,
                role: Role::User,
            })
            .await
            .unwrap()
            .id
    }

    async fn product(&self, name: &str, price: i64, stock: u32) -> ProductId {
        self.catalog
            .create(NewProduct::new(name, Category::Shirts, Money::from_major(price)).with_stock(stock))
            .await
            .unwrap()
            .id
    }

    async fn stock(&self, product_id: ProductId) -> u32 {
        self.catalog.get(product_id).await.unwrap().stock
    }

    async fn order_from_cart(&self, user_id: UserId) -> Order {
        let cart = self.carts.get(user_id).await.unwrap();
        let mut cmd = PlaceOrder::new(
            user_id,
            cart.lines.iter().map(OrderLine::from).collect(),
            address(),
            PaymentMethod::CashOnDelivery,
        );
        cmd.coupon = cart.coupon.clone();
        self.orders.create_order(cmd).await.unwrap()
    }

    async fn simple_order(&self, quantity: u32, price: i64) -> Order {
        let user_id = self.customer().await;
        let product_id = self.product("Poplin Shirt", price, 50).await;
        self.carts
            .add_item(
                user_id,
                AddToCart {
                    product_id,
                    quantity,
                    size: "M".into(),
                    color: None,
                },
            )
            .await
            .unwrap();
        self.order_from_cart(user_id).await
    }
}

fn assert_invariants(order: &Order) {
    assert!(!order.status_history.is_empty());
    assert!(order.history_is_consistent());
    assert!(order.totals.is_consistent());
}

mod pricing {
    use super::*;

    #[tokio::test]
    async fn cart_to_order_totals_match_scenario() {
        let h = harness();
        let order = h.simple_order(2, 100).await;

        assert_eq!(order.totals.subtotal, Money::from_major(200));
        assert_eq!(order.totals.tax, Money::from_major(36));
        assert_eq!(order.totals.shipping, Money::from_major(40));
        assert_eq!(order.total(), Money::from_major(276));
        assert_invariants(&order);
    }

    #[tokio::test]
    async fn coupon_below_minimum_leaves_cart_totals() {
        let h = harness();
        let user_id = h.customer().await;
        let product_id = h.product("Tee", 50, 10).await;
        let cart = h
            .carts
            .add_item(
                user_id,
                AddToCart {
                    product_id,
                    quantity: 1,
                    size: "S".into(),
                    color: None,
                },
            )
            .await
            .unwrap();

        let result = h.carts.apply_coupon(user_id, "SAVE20").await;
        assert!(matches!(
            result,
            Err(DomainError::Cart(CartError::MinimumNotMet { .. }))
        ));
        assert_eq!(h.carts.get(user_id).await.unwrap().totals, cart.totals);
    }

    #[tokio::test]
    async fn order_lines_are_frozen_snapshots() {
        let h = harness();
        let order = h.simple_order(1, 100).await;
        let product_id = order.items[0].product_id;

        h.catalog
            .update(
                product_id,
                ProductPatch {
                    name: Some("Renamed".into()),
                    price: Some(Money::from_major(999)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = h.orders.get(order.id).await.unwrap();
        assert_eq!(stored.items, order.items);
        assert_eq!(stored.items[0].name, "Poplin Shirt");
        assert_eq!(stored.total(), order.total());
    }
}

mod transitions {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn shipping_sets_tracking_eta_and_notifies() {
        let h = harness();
        let order = h.simple_order(1, 100).await;
        let before = Utc::now();

        let outcome = h
            .orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Shipped))
            .await
            .unwrap();

        let shipped = outcome.order;
        assert!(outcome.changed);
        assert_eq!(outcome.previous, OrderStatus::Pending);

        let tracking = shipped.tracking_number.clone().unwrap();
        assert!(tracking.starts_with("GF"));
        assert_eq!(tracking.len(), 13);
        assert!(tracking[2..].chars().all(|c| c.is_ascii_digit()));

        let eta = shipped.estimated_delivery.unwrap();
        assert!(eta >= before + Duration::days(7));
        assert!(eta <= Utc::now() + Duration::days(7));

        assert_eq!(h.notifier.sent_with(Template::OrderConfirmation).len(), 1);
        assert_eq!(h.notifier.sent_with(Template::OrderShipped).len(), 1);
        assert_invariants(&shipped);
    }

    #[tokio::test]
    async fn failed_notifications_do_not_block_transitions() {
        let h = harness();
        let order = h.simple_order(1, 100).await;
        h.notifier.set_fail(true);

        let shipped = h
            .orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Shipped))
            .await
            .unwrap();
        let delivered = h
            .orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Delivered))
            .await
            .unwrap();

        assert!(shipped.changed);
        assert!(delivered.changed);
        let stored = h.orders.get(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Delivered);
        assert_eq!(stored.status_history.len(), 3);
        assert!(h.notifier.sent_with(Template::OrderShipped).is_empty());
        assert!(h.notifier.sent_with(Template::OrderDelivered).is_empty());
        assert_invariants(&stored);
    }

    #[tokio::test]
    async fn repeating_a_status_is_a_no_op() {
        let h = harness();
        let order = h.simple_order(1, 100).await;

        let first = h
            .orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Processing))
            .await
            .unwrap();
        let second = h
            .orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Processing))
            .await
            .unwrap();

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(second.order.status_history.len(), 2);
        assert_eq!(second.order.version, first.order.version);
    }

    #[tokio::test]
    async fn admin_may_jump_between_any_statuses() {
        let h = harness();
        let order = h.simple_order(1, 100).await;

        for status in [
            OrderStatus::Delivered,
            OrderStatus::Pending,
            OrderStatus::Refunded,
            OrderStatus::Packed,
        ] {
            let outcome = h
                .orders
                .transition_status(order.id, StatusChange::to(status))
                .await
                .unwrap();
            assert_eq!(outcome.order.status, status);
            assert_invariants(&outcome.order);
        }

        let history = h.orders.history(order.id).await.unwrap();
        assert_eq!(history.order_number, order.order_number);
        assert_eq!(history.history.len(), 5);
        assert_eq!(history.history[1].note, "Status updated to delivered");
    }

    #[tokio::test]
    async fn bulk_transition_reports_each_order() {
        let h = harness();
        let order = h.simple_order(1, 100).await;
        let missing = OrderId::new();

        let outcomes = h
            .orders
            .bulk_transition(vec![order.id, missing], OrderStatus::Packed, None, None)
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[0].order_id, order.id);
        assert!(!outcomes[1].success);
        assert_eq!(outcomes[1].error_kind, Some("not_found"));

        let stored = h.orders.get(order.id).await.unwrap();
        assert_eq!(stored.status_history.len(), 2);
        assert_eq!(
            stored.status_history[1].note,
            "Bulk status update to packed"
        );
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let h = harness();
        let result = h
            .orders
            .transition_status(OrderId::new(), StatusChange::to(OrderStatus::Shipped))
            .await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_transitions_keep_history_consistent() {
        let h = Arc::new(harness());
        let order = h.simple_order(1, 100).await;

        let mut handles = Vec::new();
        for status in OrderStatus::ALL.into_iter().cycle().take(12) {
            let h = h.clone();
            handles.push(tokio::spawn(async move {
                h.orders
                    .transition_status(order.id, StatusChange::to(status))
                    .await
            }));
        }
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) | Err(DomainError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        let stored = h.orders.get(order.id).await.unwrap();
        assert_invariants(&stored);
    }
}

mod stock {
    use super::*;

    #[tokio::test]
    async fn oversubtract_floors_at_zero() {
        let h = harness();
        let product_id = h.product("Chinos", 100, 30).await;

        let change = h
            .inventory
            .adjust_stock(product_id, 50, StockOperation::Subtract)
            .await
            .unwrap();
        assert_eq!(change.new_stock, 0);
        assert_eq!(h.stock(product_id).await, 0);
    }

    #[tokio::test]
    async fn manual_policy_never_touches_stock() {
        let h = harness();
        let order = h.simple_order(3, 100).await;
        let product_id = order.items[0].product_id;

        h.orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Shipped))
            .await
            .unwrap();
        h.orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(h.stock(product_id).await, 50);
    }

    #[tokio::test]
    async fn reserve_on_create_holds_and_cancel_releases() {
        let h = harness_with(CommerceSettings {
            stock_policy: StockPolicy::ReserveOnCreate,
            ..Default::default()
        });
        let order = h.simple_order(3, 100).await;
        let product_id = order.items[0].product_id;
        assert!(order.stock_reserved);
        assert_eq!(h.stock(product_id).await, 47);

        let cancelled = h
            .orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Cancelled))
            .await
            .unwrap();
        assert!(!cancelled.order.stock_reserved);
        assert_eq!(h.stock(product_id).await, 50);

        // a second cancel is a no-op and releases nothing
        h.orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(h.stock(product_id).await, 50);
    }

    #[tokio::test]
    async fn cancel_after_shipping_and_rollback_keeps_stock_out() {
        let h = harness_with(CommerceSettings {
            stock_policy: StockPolicy::ReserveOnCreate,
            ..Default::default()
        });
        let order = h.simple_order(3, 100).await;
        let product_id = order.items[0].product_id;
        assert_eq!(h.stock(product_id).await, 47);

        for status in [OrderStatus::Shipped, OrderStatus::Processing, OrderStatus::Cancelled] {
            h.orders
                .transition_status(order.id, StatusChange::to(status))
                .await
                .unwrap();
        }

        let stored = h.orders.get(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert!(stored.ever_shipped());
        assert!(stored.stock_reserved);
        assert_eq!(h.stock(product_id).await, 47);
    }

    #[tokio::test]
    async fn reactivating_a_cancelled_order_holds_stock_again() {
        let h = harness_with(CommerceSettings {
            stock_policy: StockPolicy::ReserveOnCreate,
            ..Default::default()
        });
        let order = h.simple_order(3, 100).await;
        let product_id = order.items[0].product_id;

        h.orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(h.stock(product_id).await, 50);

        let reopened = h
            .orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Processing))
            .await
            .unwrap();
        assert!(reopened.order.stock_reserved);
        assert_eq!(h.stock(product_id).await, 47);

        h.orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Shipped))
            .await
            .unwrap();
        assert_eq!(h.stock(product_id).await, 47);
    }

    #[tokio::test]
    async fn reactivation_without_stock_stays_cancelled() {
        let h = harness_with(CommerceSettings {
            stock_policy: StockPolicy::ReserveOnCreate,
            ..Default::default()
        });
        let order = h.simple_order(3, 100).await;
        let product_id = order.items[0].product_id;
        h.orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Cancelled))
            .await
            .unwrap();
        h.inventory
            .adjust_stock(product_id, 2, StockOperation::Set)
            .await
            .unwrap();

        let result = h
            .orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Pending))
            .await;
        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));

        let stored = h.orders.get(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert!(!stored.stock_reserved);
        assert_eq!(h.stock(product_id).await, 2);
    }

    #[tokio::test]
    async fn reserve_on_create_fails_without_stock() {
        let h = harness_with(CommerceSettings {
            stock_policy: StockPolicy::ReserveOnCreate,
            ..Default::default()
        });
        let user_id = h.customer().await;
        let product_id = h.product("Rare Scarf", 100, 1).await;
        let lines = vec![OrderLine {
            product_id,
            name: "Rare Scarf".into(),
            price: Money::from_major(100),
            quantity: 2,
            size: "OS".into(),
            color: None,
            image: None,
        }];

        let result = h
            .orders
            .create_order(PlaceOrder::new(user_id, lines, address(), PaymentMethod::Paypal))
            .await;
        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
        assert_eq!(h.stock(product_id).await, 1);
    }

    #[tokio::test]
    async fn reserve_on_ship_takes_stock_when_shipped() {
        let h = harness_with(CommerceSettings {
            stock_policy: StockPolicy::ReserveOnShip,
            ..Default::default()
        });
        let order = h.simple_order(4, 100).await;
        let product_id = order.items[0].product_id;
        assert_eq!(h.stock(product_id).await, 50);

        let shipped = h
            .orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Shipped))
            .await
            .unwrap();
        assert!(shipped.order.stock_reserved);
        assert_eq!(h.stock(product_id).await, 46);

        // cancelling after shipping keeps the stock out
        h.orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(h.stock(product_id).await, 46);
    }

    #[tokio::test]
    async fn reserve_on_ship_without_stock_does_not_ship() {
        let h = harness_with(CommerceSettings {
            stock_policy: StockPolicy::ReserveOnShip,
            ..Default::default()
        });
        let order = h.simple_order(4, 100).await;
        let product_id = order.items[0].product_id;
        h.inventory
            .adjust_stock(product_id, 1, StockOperation::Set)
            .await
            .unwrap();

        let result = h
            .orders
            .transition_status(order.id, StatusChange::to(OrderStatus::Shipped))
            .await;
        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));

        let stored = h.orders.get(order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.status_history.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_oversell() {
        let h = Arc::new(harness());
        let product_id = h.product("Limited Jacket", 100, 10).await;

        let mut handles = Vec::new();
        for _ in 0..25 {
            let h = h.clone();
            handles.push(tokio::spawn(async move {
                h.inventory.reserve(product_id, 1).await
            }));
        }
        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(DomainError::InsufficientStock { .. }) | Err(DomainError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert!(successes <= 10);
        assert_eq!(h.stock(product_id).await, 10 - successes);
    }
}

mod reads {
    use super::*;
    use domain::{Caller, OrderFilter, PageRequest};

    #[tokio::test]
    async fn tracking_checks_ownership() {
        let h = harness();
        let order = h.simple_order(1, 100).await;
        let owner = Caller {
            user_id: order.user_id,
            is_admin: false,
        };
        let stranger = Caller {
            user_id: UserId::new(),
            is_admin: false,
        };
        let admin = Caller {
            user_id: UserId::new(),
            is_admin: true,
        };

        assert!(h.orders.tracking(&order.order_number, None).await.is_ok());
        assert!(h.orders.tracking(&order.order_number, Some(owner)).await.is_ok());
        assert!(h.orders.tracking(&order.order_number, Some(admin)).await.is_ok());
        assert!(matches!(
            h.orders.tracking(&order.order_number, Some(stranger)).await,
            Err(DomainError::Forbidden(_))
        ));
        assert!(matches!(
            h.orders.tracking("GF0000000000", None).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn user_and_admin_listings() {
        let h = harness();
        let first = h.simple_order(1, 100).await;
        let second = h.simple_order(2, 100).await;

        let mine = h
            .orders
            .list_for_user(first.user_id, None, PageRequest::new(None, None, 10))
            .await
            .unwrap();
        assert_eq!(mine.items.len(), 1);
        assert_eq!(mine.items[0].id, first.id);

        let all = h.orders.admin_list(OrderFilter::default()).await.unwrap();
        assert_eq!(all.pagination.total_items, 2);
        assert_eq!(all.items[0].id, second.id);

        let by_name = h
            .orders
            .admin_list(OrderFilter {
                q: Some("meer".into()),
                status: Some(OrderStatus::Pending),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.pagination.total_items, 2);

        let by_number = h
            .orders
            .admin_list(OrderFilter {
                q: Some(second.order_number.to_lowercase()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_number.items.len(), 1);
    }

    #[tokio::test]
    async fn label_carries_qr_payload() {
        let h = harness();
        let order = h.simple_order(2, 100).await;

        let label = h.orders.label(order.id).await.unwrap();
        assert_eq!(label.order_number, order.order_number);
        assert_eq!(label.items[0].quantity, 2);
        assert_eq!(label.totals.total, Money::from_major(276));
        assert_eq!(label.qr_payload.kind, "delivery");
        assert_eq!(label.qr_payload.tracking_number, None);

        let json = serde_json::to_value(&label.qr_payload).unwrap();
        assert_eq!(json["type"], "delivery");
    }
}
