use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use document_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::error::DomainError;

/// Fixed product categories of the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Shirts,
    Pants,
    Dresses,
    Jackets,
    Sweaters,
    Suits,
    Shoes,
    Sports,
    Hoodies,
    Accessories,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Shirts,
        Category::Pants,
        Category::Dresses,
        Category::Jackets,
        Category::Sweaters,
        Category::Suits,
        Category::Shoes,
        Category::Sports,
        Category::Hoodies,
        Category::Accessories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Shirts => "shirts",
            Category::Pants => "pants",
            Category::Dresses => "dresses",
            Category::Jackets => "jackets",
            Category::Sweaters => "sweaters",
            Category::Suits => "suits",
            Category::Shoes => "shoes",
            Category::Sports => "sports",
            Category::Hoodies => "hoodies",
            Category::Accessories => "accessories",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::InvalidArgument(format!("unknown category '{s}'")))
    }
}

/// A catalog product. Stock is owned by the inventory manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: Option<String>,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub original_price: Option<Money>,
    pub category: Category,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    pub images: Vec<String>,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub stock: u32,
    pub active: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub version: Version,
}

impl Product {
    /// Builds a new active product from validated input.
    pub fn create(input: NewProduct) -> Result<Self, DomainError> {
        input.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: ProductId::new(),
            sku: input.sku.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            name: input.name.trim().to_string(),
            description: input.description,
            price: input.price,
            original_price: input.original_price,
            category: input.category,
            subcategory: input.subcategory,
            brand: input.brand,
            images: input.images,
            sizes: input.sizes,
            colors: input.colors,
            stock: input.stock,
            active: true,
            featured: input.featured,
            created_at: now,
            updated_at: now,
            version: Version::initial(),
        })
    }

    /// Applies a partial update. Returns true if anything changed.
    pub fn apply_patch(&mut self, patch: &ProductPatch) -> Result<bool, DomainError> {
        patch.validate()?;
        let before = self.clone();

        if let Some(ref name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(ref description) = patch.description {
            self.description = description.clone();
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(original_price) = patch.original_price {
            self.original_price = Some(original_price);
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(ref images) = patch.images {
            self.images = images.clone();
        }
        if let Some(ref sizes) = patch.sizes {
            self.sizes = sizes.clone();
        }
        if let Some(ref colors) = patch.colors {
            self.colors = colors.clone();
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(featured) = patch.featured {
            self.featured = featured;
        }

        let changed = *self != before;
        if changed {
            self.updated_at = Utc::now();
        }
        Ok(changed)
    }

    /// First image, used as the line-item thumbnail.
    pub fn primary_image(&self) -> Option<String> {
        self.images.first().cloned()
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

impl Aggregate for Product {
    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn collection() -> &'static str {
        "products"
    }

    fn id(&self) -> Uuid {
        self.id.as_uuid()
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

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        self.sku
            .iter()
            .map(|sku| ("sku", sku.to_ascii_uppercase()))
            .collect()
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub sku: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub original_price: Option<Money>,
    pub category: Category,
    pub subcategory: Option<String>,
    pub brand: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub featured: bool,
}

impl NewProduct {
    /// Minimal input; everything else starts empty.
    pub fn new(name: impl Into<String>, category: Category, price: Money) -> Self {
        Self {
            sku: None,
            name: name.into(),
            description: String::new(),
            price,
            original_price: None,
            category,
            subcategory: None,
            brand: None,
            images: Vec::new(),
            sizes: Vec::new(),
            colors: Vec::new(),
            stock: 0,
            featured: false,
        }
    }

    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidArgument("product name is required".into()));
        }
        validate_prices(Some(self.price), self.original_price)
    }
}

/// Partial product update; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub original_price: Option<Money>,
    pub category: Option<Category>,
    pub images: Option<Vec<String>>,
    pub sizes: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub active: Option<bool>,
    pub featured: Option<bool>,
}

impl ProductPatch {
    fn validate(&self) -> Result<(), DomainError> {
        if let Some(ref name) = self.name
            && name.trim().is_empty()
        {
            return Err(DomainError::InvalidArgument("product name is required".into()));
        }
        validate_prices(self.price, self.original_price)
    }
}

fn validate_prices(price: Option<Money>, original: Option<Money>) -> Result<(), DomainError> {
    if price.is_some_and(|p| p.is_negative()) {
        return Err(DomainError::InvalidArgument("price cannot be negative".into()));
    }
    if original.is_some_and(|p| p.is_negative()) {
        return Err(DomainError::InvalidArgument(
            "original price cannot be negative".into(),
        ));
    }
    Ok(())
}
