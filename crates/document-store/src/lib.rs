//! Versioned JSON document persistence.
//!
//! Every document carries a monotonically increasing [`Version`]. Writes may
//! state the version they expect to replace, which turns each read-modify-write
//! cycle into an atomic compare-and-swap.

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use document::{Document, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::{DocumentQuery, FieldValue, FilterOp, SortKey};
pub use store::{DocumentStore, DocumentStoreExt, DocumentStream, WriteOptions};
