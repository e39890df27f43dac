use std::sync::Arc;

use common::{ProductId, UserId};
use document_store::{DocumentStore, StoreError};
use serde::Deserialize;

use super::{Cart, CartError, CartLine, CouponRegistry};
use crate::catalog::Product;
use crate::error::DomainError;
use crate::repository::{Outcome, Repository};
use crate::settings::CommerceSettings;

/// Request to add a product to a cart.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub size: String,
    #[serde(default)]
    pub color: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

/// Service for per-user carts.
pub struct CartService<S: DocumentStore> {
    carts: Repository<S, Cart>,
    products: Repository<S, Product>,
    coupons: Arc<dyn CouponRegistry>,
    settings: Arc<CommerceSettings>,
}

impl<S: DocumentStore + Clone> CartService<S> {
    pub fn new(
        store: S,
        coupons: Arc<dyn CouponRegistry>,
        settings: Arc<CommerceSettings>,
    ) -> Self {
        Self {
            carts: Repository::new(store.clone(), settings.write_retries),
            products: Repository::new(store, settings.write_retries),
            coupons,
            settings,
        }
    }
}

impl<S: DocumentStore> CartService<S> {
    /// Returns the user's cart, or an empty one if none has been stored yet.
    pub async fn get(&self, user_id: UserId) -> Result<Cart, DomainError> {
        Ok(self
            .carts
            .load(user_id.as_uuid())
            .await?
            .unwrap_or_else(|| Cart::new(user_id)))
    }

    /// Adds a product line, merging with an existing line of the same size.
    #[tracing::instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn add_item(&self, user_id: UserId, request: AddToCart) -> Result<Cart, DomainError> {
        if request.quantity == 0 {
            return Err(DomainError::InvalidArgument(
                "quantity must be at least 1".to_string(),
            ));
        }
        if request.size.trim().is_empty() {
            return Err(DomainError::InvalidArgument("size is required".to_string()));
        }

        let product = self
            .products
            .load(request.product_id.as_uuid())
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| DomainError::not_found("Product", request.product_id))?;

        if product.stock < request.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                requested: request.quantity,
                available: product.stock,
            });
        }

        let line = CartLine {
            product_id: product.id,
            name: product.name.clone(),
            price: product.price,
            quantity: request.quantity,
            size: request.size.trim().to_string(),
            color: request.color.filter(|c| !c.trim().is_empty()),
            image: product.primary_image(),
            in_stock: product.in_stock(),
        };

        self.ensure_cart(user_id).await?;
        let settings = &self.settings;
        let result = self
            .carts
            .update(user_id.as_uuid(), |cart| {
                cart.add_line(line.clone(), settings);
                Ok(Outcome::Changed(()))
            })
            .await?;
        Ok(result.aggregate)
    }

    /// Sets a line's quantity; zero or less removes it.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        size: &str,
        quantity: i64,
    ) -> Result<Cart, DomainError> {
        let settings = &self.settings;
        self.update_existing(user_id, |cart| {
            cart.set_quantity(product_id, size, quantity, settings)?;
            Ok(Outcome::Changed(()))
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        size: &str,
    ) -> Result<Cart, DomainError> {
        let settings = &self.settings;
        self.update_existing(user_id, |cart| {
            if cart.remove_line(product_id, size, settings) {
                Ok(Outcome::Changed(()))
            } else {
                Err(CartError::LineNotFound {
                    product_id,
                    size: size.to_string(),
                }
                .into())
            }
        })
        .await
    }

    /// Empties the cart. Clearing a cart that was never stored is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, user_id: UserId) -> Result<Cart, DomainError> {
        if !self.exists(user_id).await? {
            return Ok(Cart::new(user_id));
        }
        let settings = &self.settings;
        self.update_existing(user_id, |cart| {
            if cart.clear(settings) {
                Ok(Outcome::Changed(()))
            } else {
                Ok(Outcome::Unchanged(()))
            }
        })
        .await
    }

    /// Looks up a coupon code and applies it to the cart.
    #[tracing::instrument(skip(self))]
    pub async fn apply_coupon(&self, user_id: UserId, code: &str) -> Result<Cart, DomainError> {
        let code = code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::InvalidArgument(
                "coupon code is required".to_string(),
            ));
        }
        let coupon = self
            .coupons
            .lookup(code)
            .await
            .ok_or_else(|| CartError::InvalidCoupon {
                code: super::coupon::normalize_code(code),
            })?;

        let settings = &self.settings;
        self.update_existing(user_id, |cart| {
            cart.apply_coupon(coupon.clone(), settings)?;
            Ok(Outcome::Changed(()))
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_coupon(&self, user_id: UserId) -> Result<Cart, DomainError> {
        if !self.exists(user_id).await? {
            return Ok(Cart::new(user_id));
        }
        let settings = &self.settings;
        self.update_existing(user_id, |cart| {
            if cart.remove_coupon(settings) {
                Ok(Outcome::Changed(()))
            } else {
                Ok(Outcome::Unchanged(()))
            }
        })
        .await
    }

    async fn exists(&self, user_id: UserId) -> Result<bool, DomainError> {
        Ok(self.carts.load(user_id.as_uuid()).await?.is_some())
    }

    /// Runs a mutation against a stored cart. A missing cart behaves like an
    /// empty one, so line lookups fail with `LineNotFound`.
    async fn update_existing<F>(&self, user_id: UserId, mut mutate: F) -> Result<Cart, DomainError>
    where
        F: FnMut(&mut Cart) -> Result<Outcome<()>, DomainError>,
    {
        if !self.exists(user_id).await? {
            let mut cart = Cart::new(user_id);
            mutate(&mut cart)?;
            self.ensure_cart(user_id).await?;
        }
        let result = self.carts.update(user_id.as_uuid(), mutate).await?;
        Ok(result.aggregate)
    }

    /// Creates the cart document on first use.
    async fn ensure_cart(&self, user_id: UserId) -> Result<(), DomainError> {
        if self.exists(user_id).await? {
            return Ok(());
        }
        match self.carts.insert(Cart::new(user_id)).await {
            Ok(_) => Ok(()),
            // another request created it first
            Err(DomainError::Store(StoreError::DuplicateKey { .. })) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::StaticCouponRegistry;
    use crate::catalog::{Category, NewProduct};
    use common::Money;
    use document_store::InMemoryDocumentStore;

    struct Fixture {
        service: CartService<InMemoryDocumentStore>,
        products: Repository<InMemoryDocumentStore, Product>,
    }

    fn fixture() -> Fixture {
        let store = InMemoryDocumentStore::new();
        Fixture {
            service: CartService::new(
                store.clone(),
                Arc::new(StaticCouponRegistry::with_defaults()),
                Arc::new(CommerceSettings::default()),
            ),
            products: Repository::new(store, 8),
        }
    }

    async fn product(fx: &Fixture, price: i64, stock: u32) -> Product {
        let mut input =
            NewProduct::new("Oxford Shirt", Category::Shirts, Money::from_major(price))
                .with_stock(stock);
        input.images = vec!["oxford.jpg".into()];
        let product = Product::create(input).unwrap();
        fx.products.insert(product).await.unwrap()
    }

    fn add(product_id: ProductId, quantity: u32) -> AddToCart {
        AddToCart {
            product_id,
            quantity,
            size: "M".into(),
            color: None,
        }
    }

    #[tokio::test]
    async fn add_item_creates_cart_and_prices_it() {
        let fx = fixture();
        let user = UserId::new();
        let shirt = product(&fx, 100, 20).await;

        let cart = fx.service.add_item(user, add(shirt.id, 2)).await.unwrap();

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].image.as_deref(), Some("oxford.jpg"));
        assert_eq!(cart.totals.total, Money::from_major(276));
        assert_eq!(fx.service.get(user).await.unwrap().totals, cart.totals);
    }

    #[tokio::test]
    async fn add_item_rejects_missing_inactive_and_short_stock() {
        let fx = fixture();
        let user = UserId::new();

        let missing = fx.service.add_item(user, add(ProductId::new(), 1)).await;
        assert!(matches!(missing, Err(DomainError::NotFound { .. })));

        let hidden = product(&fx, 100, 5).await;
        fx.products
            .update(hidden.id.as_uuid(), |p| {
                p.active = false;
                Ok(Outcome::Changed(()))
            })
            .await
            .unwrap();
        let inactive = fx.service.add_item(user, add(hidden.id, 1)).await;
        assert!(matches!(inactive, Err(DomainError::NotFound { .. })));

        let scarce = product(&fx, 100, 1).await;
        let short = fx.service.add_item(user, add(scarce.id, 2)).await;
        assert!(matches!(
            short,
            Err(DomainError::InsufficientStock { requested: 2, available: 1, .. })
        ));

        let zero = fx.service.add_item(user, add(scarce.id, 0)).await;
        assert!(matches!(zero, Err(DomainError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn update_quantity_on_missing_line_is_not_found() {
        let fx = fixture();
        let result = fx
            .service
            .update_quantity(UserId::new(), ProductId::new(), "M", 2)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Cart(CartError::LineNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn unknown_and_blank_coupons() {
        let fx = fixture();
        let user = UserId::new();

        let unknown = fx.service.apply_coupon(user, "BOGUS").await;
        assert!(matches!(
            unknown,
            Err(DomainError::Cart(CartError::InvalidCoupon { .. }))
        ));

        let blank = fx.service.apply_coupon(user, "   ").await;
        assert!(matches!(blank, Err(DomainError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn coupon_below_minimum_keeps_stored_cart() {
        let fx = fixture();
        let user = UserId::new();
        let shirt = product(&fx, 50, 10).await;
        let cart = fx.service.add_item(user, add(shirt.id, 1)).await.unwrap();

        let result = fx.service.apply_coupon(user, "save20").await;
        assert!(matches!(
            result,
            Err(DomainError::Cart(CartError::MinimumNotMet { .. }))
        ));

        let stored = fx.service.get(user).await.unwrap();
        assert_eq!(stored.totals, cart.totals);
        assert!(stored.coupon.is_none());
        assert_eq!(stored.version, cart.version);
    }

    #[tokio::test]
    async fn clear_empties_cart() {
        let fx = fixture();
        let user = UserId::new();
        let shirt = product(&fx, 100, 10).await;
        fx.service.add_item(user, add(shirt.id, 3)).await.unwrap();
        fx.service.apply_coupon(user, "SAVE20").await.unwrap();

        let cart = fx.service.clear(user).await.unwrap();
        assert!(cart.is_empty());
        assert!(cart.coupon.is_none());
        assert_eq!(cart.totals.total, Money::zero());

        // clearing a never-stored cart is fine
        assert!(fx.service.clear(UserId::new()).await.unwrap().is_empty());
    }
}
