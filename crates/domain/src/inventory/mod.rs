//! Stock counters, adjustments and stock alerts.

mod service;

pub use service::InventoryService;

use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::catalog::{Category, Product};
use crate::pagination::{Page, PageRequest};

/// How an adjustment amount is applied to the current stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockOperation {
    #[default]
    Set,
    Add,
    Subtract,
}

impl StockOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockOperation::Set => "set",
            StockOperation::Add => "add",
            StockOperation::Subtract => "subtract",
        }
    }

    /// New stock level. Subtraction floors at zero.
    pub fn apply(&self, current: u32, amount: u32) -> u32 {
        match self {
            StockOperation::Set => amount,
            StockOperation::Add => current.saturating_add(amount),
            StockOperation::Subtract => current.saturating_sub(amount),
        }
    }
}

/// Alert raised when a stock change crosses a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockSignal {
    /// Stock dropped from above the threshold to at or below it, still above zero.
    LowStock,
    /// Stock dropped from above zero to zero.
    OutOfStock,
}

impl StockSignal {
    pub fn detect(old_stock: u32, new_stock: u32, threshold: u32) -> Option<Self> {
        if old_stock > 0 && new_stock == 0 {
            Some(StockSignal::OutOfStock)
        } else if old_stock > threshold && new_stock <= threshold && new_stock > 0 {
            Some(StockSignal::LowStock)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockSignal::LowStock => "low_stock",
            StockSignal::OutOfStock => "out_of_stock",
        }
    }
}

/// Result of a single stock adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub product_id: ProductId,
    pub name: String,
    pub old_stock: u32,
    pub new_stock: u32,
    pub operation: StockOperation,
    pub signal: Option<StockSignal>,
    /// False when the operation left the stock level as it was.
    #[serde(default)]
    pub changed: bool,
}

/// One entry of a bulk adjustment request.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub stock: u32,
    #[serde(default)]
    pub operation: StockOperation,
}

/// Per-item outcome of a bulk adjustment.
#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentResult {
    pub product_id: ProductId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<StockChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkAdjustReport {
    pub results: Vec<AdjustmentResult>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Listing filter for the inventory overview.
#[derive(Debug, Clone, Copy)]
pub struct InventoryFilter {
    pub category: Option<Category>,
    pub low_stock: bool,
    pub out_of_stock: bool,
    pub page: PageRequest,
}

impl Default for InventoryFilter {
    fn default() -> Self {
        Self {
            category: None,
            low_stock: false,
            out_of_stock: false,
            page: PageRequest::new(None, None, 20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryStock {
    pub category: Category,
    pub count: u64,
    pub total_stock: u64,
    pub low_stock: u64,
    pub out_of_stock: u64,
}

/// Stock statistics over active products.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct InventoryStats {
    pub total_products: u64,
    pub low_stock_count: u64,
    pub out_of_stock_count: u64,
    pub total_inventory_value: Money,
    pub category_breakdown: Vec<CategoryStock>,
}

impl InventoryStats {
    /// Aggregates statistics; inactive products are ignored.
    pub fn collect<'a>(products: impl IntoIterator<Item = &'a Product>, threshold: u32) -> Self {
        let mut stats = InventoryStats::default();
        for product in products.into_iter().filter(|p| p.active) {
            let low = product.stock > 0 && product.stock <= threshold;
            let out = product.stock == 0;

            stats.total_products += 1;
            stats.low_stock_count += u64::from(low);
            stats.out_of_stock_count += u64::from(out);
            stats.total_inventory_value += product.price.multiply(product.stock);

            let index = match stats
                .category_breakdown
                .iter()
                .position(|c| c.category == product.category)
            {
                Some(index) => index,
                None => {
                    stats.category_breakdown.push(CategoryStock {
                        category: product.category,
                        count: 0,
                        total_stock: 0,
                        low_stock: 0,
                        out_of_stock: 0,
                    });
                    stats.category_breakdown.len() - 1
                }
            };
            let entry = &mut stats.category_breakdown[index];
            entry.count += 1;
            entry.total_stock += u64::from(product.stock);
            entry.low_stock += u64::from(low);
            entry.out_of_stock += u64::from(out);
        }
        stats.category_breakdown.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.category.as_str().cmp(b.category.as_str()))
        });
        stats
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InventoryOverview {
    pub products: Page<Product>,
    pub stats: InventoryStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NewProduct;

    #[test]
    fn subtract_floors_at_zero() {
        assert_eq!(StockOperation::Subtract.apply(30, 50), 0);
        assert_eq!(StockOperation::Add.apply(30, 5), 35);
        assert_eq!(StockOperation::Set.apply(30, 5), 5);
    }

    #[test]
    fn signals_fire_on_crossing_only() {
        assert_eq!(StockSignal::detect(12, 8, 10), Some(StockSignal::LowStock));
        assert_eq!(StockSignal::detect(12, 10, 10), Some(StockSignal::LowStock));
        assert_eq!(StockSignal::detect(9, 8, 10), None);
        assert_eq!(StockSignal::detect(5, 0, 10), Some(StockSignal::OutOfStock));
        assert_eq!(StockSignal::detect(20, 0, 10), Some(StockSignal::OutOfStock));
        assert_eq!(StockSignal::detect(0, 0, 10), None);
        assert_eq!(StockSignal::detect(0, 5, 10), None);
    }

    #[test]
    fn stats_skip_inactive_and_sort_categories() {
        let mut products = vec![
            Product::create(NewProduct::new("A", Category::Shirts, Money::from_major(10)).with_stock(5)).unwrap(),
            Product::create(NewProduct::new("B", Category::Shirts, Money::from_major(20)).with_stock(0)).unwrap(),
            Product::create(NewProduct::new("C", Category::Pants, Money::from_major(30)).with_stock(50)).unwrap(),
            Product::create(NewProduct::new("D", Category::Pants, Money::from_major(30)).with_stock(50)).unwrap(),
            Product::create(NewProduct::new("E", Category::Shirts, Money::from_major(1)).with_stock(1)).unwrap(),
        ];
        products[3].active = false;

        let stats = InventoryStats::collect(&products, 10);
        assert_eq!(stats.total_products, 4);
        assert_eq!(stats.low_stock_count, 2);
        assert_eq!(stats.out_of_stock_count, 1);
        assert_eq!(stats.total_inventory_value, Money::from_major(50 + 1500 + 1));
        assert_eq!(stats.category_breakdown[0].category, Category::Shirts);
        assert_eq!(stats.category_breakdown[0].count, 3);
        assert_eq!(stats.category_breakdown[1].total_stock, 50);
    }
}
