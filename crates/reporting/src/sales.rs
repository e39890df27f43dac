//! Sales buckets and category breakdowns.

use std::collections::{BTreeMap, HashMap};

use common::{Money, ProductId};
use domain::{Category, Order, OrderStatus};
use serde::Serialize;

use crate::interval::ReportInterval;

/// Sales figures for one period.
///
/// Refunded orders are kept out of `orders`, `items` and `revenue` and
/// counted in the refunded columns instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesBucket {
    pub period: String,
    pub orders: u64,
    pub items: u64,
    pub revenue: Money,
    pub refunded_orders: u64,
    pub refunded_amount: Money,
}

impl SalesBucket {
    fn empty(period: String) -> Self {
        Self {
            period,
            orders: 0,
            items: 0,
            revenue: Money::zero(),
            refunded_orders: 0,
            refunded_amount: Money::zero(),
        }
    }

    fn record(&mut self, order: &Order) {
        match order.status {
            OrderStatus::Cancelled => {}
            OrderStatus::Refunded => {
                self.refunded_orders += 1;
                self.refunded_amount += order.total();
            }
            _ => {
                self.orders += 1;
                self.items += u64::from(order.item_count());
                self.revenue += order.total();
            }
        }
    }
}

/// Buckets orders by period, ascending. Cancelled orders are skipped and
/// periods with only cancelled orders do not appear.
pub fn bucket_orders<'a, I>(orders: I, interval: ReportInterval) -> Vec<SalesBucket>
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut buckets: BTreeMap<String, SalesBucket> = BTreeMap::new();
    for order in orders {
        if order.status == OrderStatus::Cancelled {
            continue;
        }
        let period = interval.period_key(order.created_at);
        buckets
            .entry(period.clone())
            .or_insert_with(|| SalesBucket::empty(period))
            .record(order);
    }
    buckets.into_values().collect()
}

/// Units and revenue sold in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySales {
    pub category: Category,
    pub quantity: u64,
    pub revenue: Money,
}

/// Revenue by category over non-cancelled, non-refunded orders, highest
/// first. Lines whose product is unknown are skipped.
pub fn category_breakdown<'a, I>(
    orders: I,
    categories: &HashMap<ProductId, Category>,
) -> Vec<CategorySales>
where
    I: IntoIterator<Item = &'a Order>,
{
    let mut totals: HashMap<Category, CategorySales> = HashMap::new();
    let counted = orders
        .into_iter()
        .filter(|o| !matches!(o.status, OrderStatus::Cancelled | OrderStatus::Refunded));
    for order in counted {
        for line in &order.items {
            let Some(&category) = categories.get(&line.product_id) else {
                continue;
            };
            let entry = totals.entry(category).or_insert(CategorySales {
                category,
                quantity: 0,
                revenue: Money::zero(),
            });
            entry.quantity += u64::from(line.quantity);
            entry.revenue += line.line_total();
        }
    }

    let mut breakdown: Vec<_> = totals.into_values().collect();
    breakdown.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });
    breakdown
}

/// Time series plus category breakdown for the analytics view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analytics {
    pub interval: ReportInterval,
    pub timeseries: Vec<SalesBucket>,
    pub by_category: Vec<CategorySales>,
}
