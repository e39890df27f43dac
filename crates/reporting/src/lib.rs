//! Admin reporting over orders and products.
//!
//! This crate provides the read-only reporting path:
//! - [`ReportInterval`] and [`ReportRange`] for bucketing and date ranges
//! - [`SalesBucket`] accumulation of order counts, items and revenue
//! - [`ReportService`] for the sales report and the analytics view

pub mod error;
pub mod interval;
pub mod sales;
pub mod service;

pub use error::{ReportError, Result};
pub use interval::{DEFAULT_RANGE_DAYS, ReportInterval, ReportRange};
pub use sales::{Analytics, CategorySales, SalesBucket};
pub use service::ReportService;
