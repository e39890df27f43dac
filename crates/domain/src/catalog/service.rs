use common::ProductId;
use document_store::{DocumentStore, SortKey, StoreError, query::path};

use crate::catalog::{Category, NewProduct, Product, ProductPatch};
use crate::error::DomainError;
use crate::pagination::{Page, PageRequest};
use crate::repository::{Outcome, Repository};

/// Listing filter for the public catalog.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub search: Option<String>,
    pub include_inactive: bool,
}

/// Service for managing catalog products.
pub struct CatalogService<S: DocumentStore> {
    products: Repository<S, Product>,
}

impl<S: DocumentStore> CatalogService<S> {
    pub fn new(store: S, write_retries: u32) -> Self {
        Self {
            products: Repository::new(store, write_retries),
        }
    }

    /// Creates a product. A SKU already in use is a conflict.
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: NewProduct) -> Result<Product, DomainError> {
        let product = Product::create(input)?;
        match self.products.insert(product).await {
            Ok(product) => {
                tracing::info!(product_id = %product.id, "product created");
                Ok(product)
            }
            Err(DomainError::Store(StoreError::DuplicateKey { value, .. })) => Err(
                DomainError::Conflict(format!("SKU {value} is already in use")),
            ),
            Err(e) => Err(e),
        }
    }

    /// Loads a product regardless of its active flag.
    pub async fn get(&self, id: ProductId) -> Result<Product, DomainError> {
        self.products.load_required(id.as_uuid()).await
    }

    /// Loads a product visible to shoppers.
    pub async fn get_active(&self, id: ProductId) -> Result<Product, DomainError> {
        let product = self.get(id).await?;
        if !product.active {
            return Err(DomainError::not_found("Product", id));
        }
        Ok(product)
    }

    pub async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, DomainError> {
        self.products
            .find_by_key("sku", &sku.trim().to_ascii_uppercase())
            .await
    }

    /// Lists products, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, DomainError> {
        let mut query = self.products.all();
        if !filter.include_inactive {
            query = query.eq("active", true);
        }
        if let Some(category) = filter.category {
            query = query.eq("category", category.as_str());
        }
        if let Some(ref needle) = filter.search
            && !needle.trim().is_empty()
        {
            query = query.search(&["name", "description", "brand"], needle.trim());
        }
        let query = query
            .sort_by(SortKey::CreatedAt, true)
            .sort_by(SortKey::Str(path("name")), false)
            .page(page.page, page.limit);

        let (items, total) = self.products.query_page(query).await?;
        Ok(Page::new(items, page, total))
    }

    /// Applies a partial update.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, id: ProductId, patch: ProductPatch) -> Result<Product, DomainError> {
        let result = self
            .products
            .update(id.as_uuid(), |product| {
                if product.apply_patch(&patch)? {
                    Ok(Outcome::Changed(()))
                } else {
                    Ok(Outcome::Unchanged(()))
                }
            })
            .await?;
        Ok(result.aggregate)
    }

    /// Soft-deletes a product. Orders keep referencing it.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, id: ProductId) -> Result<Product, DomainError> {
        self.update(
            id,
            ProductPatch {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
    }
}
