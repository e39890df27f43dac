//! Product catalog.

mod product;
mod service;

pub use product::{Category, NewProduct, Product, ProductPatch};
pub use service::{CatalogService, ProductFilter};
