use chrono::{DateTime, Utc};
use common::{Money, ProductId, UserId};
use document_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CartError, Coupon};
use crate::aggregate::Aggregate;
use crate::pricing::Totals;
use crate::settings::CommerceSettings;

/// A product/size selection with the catalog data captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: u32,
    pub size: String,
    pub color: Option<String>,
    pub image: Option<String>,
    pub in_stock: bool,
}

impl CartLine {
    fn matches(&self, product_id: ProductId, size: &str) -> bool {
        self.product_id == product_id && self.size == size
    }
}

/// A user's cart. One per user; the document id is the user id.
///
/// Every mutating method recomputes [`Totals`] before returning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
    pub coupon: Option<Coupon>,
    pub totals: Totals,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: Version,
}

impl Cart {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            lines: Vec::new(),
            coupon: None,
            totals: Totals::default(),
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Adds a line, merging into an existing line with the same product and size.
    ///
    /// The merged quantity is clamped to the maximum, and the line's
    /// name/price/image/stock snapshot is refreshed from `line`.
    pub fn add_line(&mut self, line: CartLine, settings: &CommerceSettings) {
        let max = settings.max_line_quantity;
        match self
            .lines
            .iter_mut()
            .find(|l| l.matches(line.product_id, &line.size))
        {
            Some(existing) => {
                let quantity = existing.quantity.saturating_add(line.quantity).min(max);
                *existing = CartLine { quantity, ..line };
            }
            None => {
                let quantity = line.quantity.clamp(1, max);
                self.lines.push(CartLine { quantity, ..line });
            }
        }
        self.touch(settings);
    }

    /// Sets a line's quantity. Zero or less removes the line.
    pub fn set_quantity(
        &mut self,
        product_id: ProductId,
        size: &str,
        quantity: i64,
        settings: &CommerceSettings,
    ) -> Result<(), CartError> {
        let index = self
            .lines
            .iter()
            .position(|l| l.matches(product_id, size))
            .ok_or_else(|| CartError::LineNotFound {
                product_id,
                size: size.to_string(),
            })?;

        if quantity <= 0 {
            self.lines.remove(index);
        } else {
            let max = settings.max_line_quantity;
            self.lines[index].quantity = quantity.min(i64::from(max)) as u32;
        }
        self.touch(settings);
        Ok(())
    }

    /// Removes a line. Returns false if there was no such line.
    pub fn remove_line(
        &mut self,
        product_id: ProductId,
        size: &str,
        settings: &CommerceSettings,
    ) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.matches(product_id, size));
        let removed = self.lines.len() != before;
        if removed {
            self.touch(settings);
        }
        removed
    }

    /// Empties the cart and drops the coupon. Returns false if it was already empty.
    pub fn clear(&mut self, settings: &CommerceSettings) -> bool {
        if self.lines.is_empty() && self.coupon.is_none() {
            return false;
        }
        self.lines.clear();
        self.coupon = None;
        self.touch(settings);
        true
    }

    /// Applies a coupon if the current subtotal meets its minimum.
    ///
    /// On failure the cart is left untouched.
    pub fn apply_coupon(
        &mut self,
        coupon: Coupon,
        settings: &CommerceSettings,
    ) -> Result<(), CartError> {
        let subtotal = self.totals.subtotal;
        if !coupon.is_eligible(subtotal) {
            return Err(CartError::MinimumNotMet {
                code: coupon.code,
                minimum: coupon.minimum,
                subtotal,
            });
        }
        self.coupon = Some(coupon);
        self.touch(settings);
        Ok(())
    }

    /// Removes the applied coupon. Returns false if none was applied.
    pub fn remove_coupon(&mut self, settings: &CommerceSettings) -> bool {
        if self.coupon.take().is_none() {
            return false;
        }
        self.touch(settings);
        true
    }

    /// Recomputes totals from the lines and coupon.
    pub fn recompute(&mut self, settings: &CommerceSettings) {
        self.totals = Totals::compute(
            self.lines.iter().map(|l| (l.price, l.quantity)),
            self.coupon.as_ref(),
            settings,
        );
    }

    fn touch(&mut self, settings: &CommerceSettings) {
        self.recompute(settings);
        self.updated_at = Utc::now();
    }
}

impl Aggregate for Cart {
    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn collection() -> &'static str {
        "carts"
    }

    fn id(&self) -> Uuid {
        self.user_id.as_uuid()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
