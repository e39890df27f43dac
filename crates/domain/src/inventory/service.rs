use std::sync::Arc;

use chrono::Utc;
use common::ProductId;
use document_store::{DocumentStore, FilterOp, SortKey, query::path};

use super::{
    AdjustmentResult, BulkAdjustReport, InventoryFilter, InventoryOverview, InventoryStats,
    StockAdjustment, StockChange, StockOperation, StockSignal,
};
use crate::catalog::Product;
use crate::error::DomainError;
use crate::notify::{Dispatcher, Notification, NotificationContext, ProductSummary, Template};
use crate::pagination::Page;
use crate::repository::{Outcome, Repository};
use crate::settings::CommerceSettings;

/// Owns product stock counters.
///
/// Every change is a compare-and-swap on the product document, so concurrent
/// adjustments never lose updates and [`reserve`](Self::reserve) never takes
/// stock below zero.
pub struct InventoryService<S: DocumentStore> {
    products: Repository<S, Product>,
    dispatcher: Dispatcher,
    settings: Arc<CommerceSettings>,
}

impl<S: DocumentStore + Clone> Clone for InventoryService<S> {
    fn clone(&self) -> Self {
        Self {
            products: self.products.clone(),
            dispatcher: self.dispatcher.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: DocumentStore> InventoryService<S> {
    pub fn new(store: S, dispatcher: Dispatcher, settings: Arc<CommerceSettings>) -> Self {
        Self {
            products: Repository::new(store, settings.write_retries),
            dispatcher,
            settings,
        }
    }

    /// Applies a set/add/subtract adjustment.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        amount: u32,
        operation: StockOperation,
    ) -> Result<StockChange, DomainError> {
        let threshold = self.settings.low_stock_threshold;
        let result = self
            .products
            .update(product_id.as_uuid(), |product| {
                let old_stock = product.stock;
                let new_stock = operation.apply(old_stock, amount);
                if new_stock == old_stock {
                    return Ok(Outcome::Unchanged((old_stock, new_stock)));
                }
                product.stock = new_stock;
                product.updated_at = Utc::now();
                Ok(Outcome::Changed((old_stock, new_stock)))
            })
            .await?;

        let (old_stock, new_stock) = result.value;
        let product = result.aggregate;
        if result.changed {
            metrics::counter!("stock_adjustments_total", "operation" => operation.as_str())
                .increment(1);
            tracing::info!(%product_id, old_stock, new_stock, operation = operation.as_str(), "stock updated");
        } else {
            tracing::debug!(%product_id, stock = old_stock, operation = operation.as_str(), "stock unchanged");
        }

        let signal = StockSignal::detect(old_stock, new_stock, threshold);
        if let Some(signal) = signal {
            self.alert(&product, signal).await;
        }

        Ok(StockChange {
            product_id,
            name: product.name,
            old_stock,
            new_stock,
            operation,
            signal,
            changed: result.changed,
        })
    }

    /// Applies adjustments one by one; a failing item does not stop the rest.
    #[tracing::instrument(skip(self, adjustments), fields(count = adjustments.len()))]
    pub async fn bulk_adjust(&self, adjustments: Vec<StockAdjustment>) -> BulkAdjustReport {
        let mut results = Vec::with_capacity(adjustments.len());
        for adjustment in adjustments {
            let result = match self
                .adjust_stock(adjustment.product_id, adjustment.stock, adjustment.operation)
                .await
            {
                Ok(change) => AdjustmentResult {
                    product_id: adjustment.product_id,
                    success: true,
                    change: Some(change),
                    error: None,
                },
                Err(e) => AdjustmentResult {
                    product_id: adjustment.product_id,
                    success: false,
                    change: None,
                    error: Some(e.to_string()),
                },
            };
            results.push(result);
        }

        let successful = results.iter().filter(|r| r.success).count();
        BulkAdjustReport {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }

    /// Active products with `0 < stock <= threshold`, lowest stock first.
    pub async fn query_low_stock(&self, threshold: Option<u32>) -> Result<Vec<Product>, DomainError> {
        let threshold = threshold.unwrap_or(self.settings.low_stock_threshold);
        let query = self
            .products
            .all()
            .eq("active", true)
            .filter("stock", FilterOp::Gt, 0u32)
            .filter("stock", FilterOp::Lte, threshold)
            .sort_by(SortKey::Int(path("stock")), false)
            .sort_by(SortKey::Str(path("name")), false);
        self.products.query(query).await
    }

    /// Paged stock listing plus statistics over the whole active catalog.
    #[tracing::instrument(skip(self))]
    pub async fn overview(&self, filter: InventoryFilter) -> Result<InventoryOverview, DomainError> {
        let threshold = self.settings.low_stock_threshold;
        let mut query = self.products.all();
        if let Some(category) = filter.category {
            query = query.eq("category", category.as_str());
        }
        if filter.low_stock {
            query = query
                .filter("stock", FilterOp::Gt, 0u32)
                .filter("stock", FilterOp::Lte, threshold);
        } else if filter.out_of_stock {
            query = query.eq("stock", 0u32);
        }
        let query = query
            .sort_by(SortKey::Int(path("stock")), false)
            .sort_by(SortKey::Str(path("name")), false)
            .page(filter.page.page, filter.page.limit);
        let (items, total) = self.products.query_page(query).await?;

        let active = self
            .products
            .query(self.products.all().eq("active", true))
            .await?;
        let stats = InventoryStats::collect(&active, threshold);

        Ok(InventoryOverview {
            products: Page::new(items, filter.page, total),
            stats,
        })
    }

    /// Takes stock for an order. Fails rather than going below zero.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<u32, DomainError> {
        let result = self
            .products
            .update(product_id.as_uuid(), |product| {
                if quantity == 0 {
                    return Ok(Outcome::Unchanged(product.stock));
                }
                if product.stock < quantity {
                    return Err(DomainError::InsufficientStock {
                        product_id,
                        requested: quantity,
                        available: product.stock,
                    });
                }
                let old_stock = product.stock;
                product.stock -= quantity;
                product.updated_at = Utc::now();
                Ok(Outcome::Changed(old_stock))
            })
            .await?;

        let old_stock = result.value;
        let product = result.aggregate;
        if result.changed {
            metrics::counter!("stock_adjustments_total", "operation" => "reserve").increment(1);
            if let Some(signal) = StockSignal::detect(old_stock, product.stock, self.settings.low_stock_threshold) {
                self.alert(&product, signal).await;
            }
        }
        Ok(product.stock)
    }

    /// Puts previously reserved stock back.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, product_id: ProductId, quantity: u32) -> Result<u32, DomainError> {
        let result = self
            .products
            .update(product_id.as_uuid(), |product| {
                if quantity == 0 {
                    return Ok(Outcome::Unchanged(()));
                }
                product.stock = product.stock.saturating_add(quantity);
                product.updated_at = Utc::now();
                Ok(Outcome::Changed(()))
            })
            .await?;
        if result.changed {
            metrics::counter!("stock_adjustments_total", "operation" => "release").increment(1);
        }
        Ok(result.aggregate.stock)
    }

    /// Reserves every line or none: lines already taken are released if a
    /// later one fails.
    pub async fn reserve_all(&self, lines: &[(ProductId, u32)]) -> Result<(), DomainError> {
        let mut reserved: Vec<(ProductId, u32)> = Vec::with_capacity(lines.len());
        for &(product_id, quantity) in lines {
            if let Err(e) = self.reserve(product_id, quantity).await {
                self.release_all(&reserved).await;
                return Err(e);
            }
            reserved.push((product_id, quantity));
        }
        Ok(())
    }

    /// Releases every line, logging failures.
    pub async fn release_all(&self, lines: &[(ProductId, u32)]) {
        for &(product_id, quantity) in lines {
            if let Err(e) = self.release(product_id, quantity).await {
                tracing::error!(error = %e, %product_id, quantity, "failed to release reserved stock");
            }
        }
    }

    /// Sends a low-stock alert for every active product at or below the
    /// threshold. Returns how many alerts were sent.
    #[tracing::instrument(skip(self))]
    pub async fn low_stock_sweep(&self) -> Result<usize, DomainError> {
        let products = self.query_low_stock(None).await?;
        for product in &products {
            self.notify(product, Template::LowStock).await;
        }
        tracing::info!(count = products.len(), "low stock sweep finished");
        Ok(products.len())
    }

    async fn alert(&self, product: &Product, signal: StockSignal) {
        metrics::counter!("stock_alerts_total", "signal" => signal.as_str()).increment(1);
        tracing::warn!(product_id = %product.id, stock = product.stock, signal = signal.as_str(), "stock alert");
        let template = match signal {
            StockSignal::LowStock => Template::LowStock,
            StockSignal::OutOfStock => Template::OutOfStock,
        };
        self.notify(product, template).await;
    }

    async fn notify(&self, product: &Product, template: Template) {
        self.dispatcher
            .dispatch(Notification {
                to: self.settings.admin_email.clone(),
                template,
                context: NotificationContext {
                    product: Some(ProductSummary {
                        product_id: product.id,
                        name: product.name.clone(),
                        sku: product.sku.clone(),
                        stock: product.stock,
                    }),
                    ..Default::default()
                },
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, NewProduct};
    use crate::notify::InMemoryNotifier;
    use crate::pagination::PageRequest;
    use common::Money;
    use document_store::InMemoryDocumentStore;

    struct Fixture {
        inventory: InventoryService<InMemoryDocumentStore>,
        products: Repository<InMemoryDocumentStore, Product>,
        notifier: InMemoryNotifier,
    }

    fn fixture() -> Fixture {
        let store = InMemoryDocumentStore::new();
        let notifier = InMemoryNotifier::new();
        Fixture {
            inventory: InventoryService::new(
                store.clone(),
                Dispatcher::new(Arc::new(notifier.clone())),
                Arc::new(CommerceSettings::default()),
            ),
            products: Repository::new(store, 8),
            notifier,
        }
    }

    async fn product(fx: &Fixture, name: &str, category: Category, stock: u32) -> Product {
        let product = Product::create(
            NewProduct::new(name, category, Money::from_major(100)).with_stock(stock),
        )
        .unwrap();
        fx.products.insert(product).await.unwrap()
    }

    #[tokio::test]
    async fn oversubtract_floors_at_zero_and_alerts() {
        let fx = fixture();
        let p = product(&fx, "Chinos", Category::Pants, 30).await;

        let change = fx
            .inventory
            .adjust_stock(p.id, 50, StockOperation::Subtract)
            .await
            .unwrap();

        assert_eq!(change.old_stock, 30);
        assert_eq!(change.new_stock, 0);
        assert_eq!(change.signal, Some(StockSignal::OutOfStock));
        assert_eq!(fx.notifier.sent_with(Template::OutOfStock).len(), 1);
        assert_eq!(fx.notifier.sent()[0].to, "admin@gfresh.com");
    }

    #[tokio::test]
    async fn crossing_into_low_stock_alerts_once() {
        let fx = fixture();
        let p = product(&fx, "Chinos", Category::Pants, 15).await;

        let first = fx.inventory.adjust_stock(p.id, 8, StockOperation::Set).await.unwrap();
        let second = fx
            .inventory
            .adjust_stock(p.id, 1, StockOperation::Subtract)
            .await
            .unwrap();

        assert_eq!(first.signal, Some(StockSignal::LowStock));
        assert_eq!(second.signal, None);
        assert_eq!(fx.notifier.sent_with(Template::LowStock).len(), 1);
    }

    #[tokio::test]
    async fn no_op_adjustments_leave_the_product_alone() {
        let fx = fixture();
        let p = product(&fx, "Chinos", Category::Pants, 0).await;

        let drained = fx
            .inventory
            .adjust_stock(p.id, 5, StockOperation::Subtract)
            .await
            .unwrap();
        let same = fx.inventory.adjust_stock(p.id, 0, StockOperation::Set).await.unwrap();

        assert!(!drained.changed);
        assert!(!same.changed);
        assert_eq!(drained.signal, None);
        assert!(fx.notifier.sent().is_empty());
        let stored = fx.products.load_required(p.id.as_uuid()).await.unwrap();
        assert_eq!(stored.updated_at, p.updated_at);

        let restocked = fx.inventory.adjust_stock(p.id, 4, StockOperation::Add).await.unwrap();
        assert!(restocked.changed);
        assert_eq!(restocked.new_stock, 4);
    }

    #[tokio::test]
    async fn adjust_missing_product_is_not_found() {
        let fx = fixture();
        let result = fx
            .inventory
            .adjust_stock(ProductId::new(), 1, StockOperation::Add)
            .await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn bulk_adjust_reports_each_item() {
        let fx = fixture();
        let p = product(&fx, "Chinos", Category::Pants, 5).await;

        let report = fx
            .inventory
            .bulk_adjust(vec![
                StockAdjustment {
                    product_id: p.id,
                    stock: 3,
                    operation: StockOperation::Add,
                },
                StockAdjustment {
                    product_id: ProductId::new(),
                    stock: 3,
                    operation: StockOperation::Set,
                },
            ])
            .await;

        assert_eq!(report.total, 2);
        assert_eq!(report.successful, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.results[0].change.as_ref().map(|c| c.new_stock), Some(8));
        assert!(report.results[1].error.is_some());
    }

    #[tokio::test]
    async fn reserve_refuses_to_oversell() {
        let fx = fixture();
        let p = product(&fx, "Blazer", Category::Suits, 2).await;

        assert_eq!(fx.inventory.reserve(p.id, 2).await.unwrap(), 0);
        let result = fx.inventory.reserve(p.id, 1).await;
        assert!(matches!(
            result,
            Err(DomainError::InsufficientStock { requested: 1, available: 0, .. })
        ));
        assert_eq!(fx.inventory.release(p.id, 2).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reserve_all_rolls_back_on_failure() {
        let fx = fixture();
        let a = product(&fx, "A", Category::Shirts, 5).await;
        let b = product(&fx, "B", Category::Shirts, 1).await;

        let result = fx.inventory.reserve_all(&[(a.id, 3), (b.id, 2)]).await;
        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));

        let a = fx.products.load_required(a.id.as_uuid()).await.unwrap();
        let b = fx.products.load_required(b.id.as_uuid()).await.unwrap();
        assert_eq!(a.stock, 5);
        assert_eq!(b.stock, 1);
    }

    #[tokio::test]
    async fn low_stock_query_and_sweep() {
        let fx = fixture();
        product(&fx, "Seven", Category::Shirts, 7).await;
        product(&fx, "Two", Category::Shirts, 2).await;
        product(&fx, "Zero", Category::Shirts, 0).await;
        product(&fx, "Plenty", Category::Shirts, 40).await;

        let low = fx.inventory.query_low_stock(None).await.unwrap();
        let names: Vec<_> = low.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Two", "Seven"]);

        let narrow = fx.inventory.query_low_stock(Some(5)).await.unwrap();
        assert_eq!(narrow.len(), 1);

        assert_eq!(fx.inventory.low_stock_sweep().await.unwrap(), 2);
        assert_eq!(fx.inventory.low_stock_sweep().await.unwrap(), 2);
        assert_eq!(fx.notifier.sent_with(Template::LowStock).len(), 4);
    }

    #[tokio::test]
    async fn overview_filters_and_paginates() {
        let fx = fixture();
        product(&fx, "Tee", Category::Shirts, 0).await;
        product(&fx, "Polo", Category::Shirts, 4).await;
        product(&fx, "Jeans", Category::Pants, 30).await;

        let all = fx
            .inventory
            .overview(InventoryFilter {
                page: PageRequest::new(Some(1), Some(2), 20),
                ..Default::default()
            })
            .await
            .unwrap();
        let names: Vec<_> = all.products.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Tee", "Polo"]);
        assert_eq!(all.products.pagination.total_items, 3);
        assert!(all.products.pagination.has_next_page);
        assert_eq!(all.stats.total_products, 3);
        assert_eq!(all.stats.out_of_stock_count, 1);

        let out = fx
            .inventory
            .overview(InventoryFilter {
                out_of_stock: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out.products.items.len(), 1);

        let pants = fx
            .inventory
            .overview(InventoryFilter {
                category: Some(Category::Pants),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pants.products.items[0].name, "Jeans");
    }
}
