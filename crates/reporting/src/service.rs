//! Report service over the order and product collections.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::ProductId;
use document_store::{DocumentStore, SortKey};
use domain::{Aggregate, Category, Order, Product, Repository};
use futures_util::StreamExt;

use crate::Result;
use crate::interval::{ReportInterval, ReportRange};
use crate::sales::{self, Analytics, SalesBucket};

/// Read-only service for the admin reports.
pub struct ReportService<S: DocumentStore> {
    orders: Repository<S, Order>,
}

impl<S: DocumentStore> ReportService<S> {
    pub fn new(store: S) -> Self {
        Self {
            // reads only, so the write retry budget never applies
            orders: Repository::new(store, 1),
        }
    }

    /// Sales per period between `from` and `to` (inclusive).
    #[tracing::instrument(skip(self))]
    pub async fn sales_report(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        interval: ReportInterval,
    ) -> Result<Vec<SalesBucket>> {
        let range = ReportRange::resolve(from, to, Utc::now())?;
        let orders = self.orders_in(range).await?;
        let buckets = sales::bucket_orders(&orders, interval);

        metrics::counter!("reports_generated_total", "report" => "sales").increment(1);
        tracing::debug!(orders = orders.len(), buckets = buckets.len(), "sales report built");
        Ok(buckets)
    }

    /// Time series plus revenue by category.
    #[tracing::instrument(skip(self))]
    pub async fn analytics(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        interval: ReportInterval,
    ) -> Result<Analytics> {
        let range = ReportRange::resolve(from, to, Utc::now())?;
        let orders = self.orders_in(range).await?;
        let categories = if orders.is_empty() {
            HashMap::new()
        } else {
            self.product_categories().await?
        };

        metrics::counter!("reports_generated_total", "report" => "analytics").increment(1);
        Ok(Analytics {
            interval,
            timeseries: sales::bucket_orders(&orders, interval),
            by_category: sales::category_breakdown(&orders, &categories),
        })
    }

    async fn orders_in(&self, range: ReportRange) -> Result<Vec<Order>> {
        let query = self
            .orders
            .all()
            .created_between(Some(range.from), Some(range.to))
            .sort_by(SortKey::CreatedAt, false);
        Ok(self.orders.query(query).await?)
    }

    /// Category of every stored product, active or not.
    async fn product_categories(&self) -> Result<HashMap<ProductId, Category>> {
        let mut stream = self
            .orders
            .store()
            .stream_collection(Product::collection())
            .await?;
        let mut categories = HashMap::new();
        while let Some(doc) = stream.next().await {
            let product: Product = doc?.decode()?;
            categories.insert(product.id, product.category);
        }
        Ok(categories)
    }
}
