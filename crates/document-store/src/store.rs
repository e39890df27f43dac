use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use uuid::Uuid;

use crate::{Document, DocumentQuery, Result, Version};

/// Options for replacing a stored document.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Expected stored version for optimistic concurrency control.
    /// If None, the write is unconditional (last write wins).
    pub expected_version: Option<Version>,
}

impl WriteOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the document to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }
}

/// A stream of documents.
pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<Document>> + Send>>;

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document at version 1.
    ///
    /// Fails with `DuplicateKey` if the id or any unique key is taken.
    async fn insert(&self, doc: Document) -> Result<Document>;

    /// Fetches a document by id.
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>>;

    /// Fetches a document by one of its unique keys.
    async fn find_by_key(&self, collection: &str, key: &str, value: &str)
    -> Result<Option<Document>>;

    /// Replaces the body and keys of an existing document.
    ///
    /// If `options.expected_version` is set, the operation fails with
    /// `ConcurrencyConflict` unless the stored version matches. Returns the
    /// document as stored, with its version incremented.
    async fn replace(&self, doc: Document, options: WriteOptions) -> Result<Document>;

    /// Retrieves documents matching a query.
    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>>;

    /// Counts documents matching a query, ignoring limit and offset.
    async fn count(&self, query: DocumentQuery) -> Result<u64>;

    /// Streams every document of a collection in creation order.
    async fn stream_collection(&self, collection: &str) -> Result<DocumentStream>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Checks if a document exists.
    async fn exists(&self, collection: &str, id: Uuid) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }

    /// Fetches one page of results together with the total match count.
    async fn query_page(&self, query: DocumentQuery) -> Result<(Vec<Document>, u64)> {
        let total = self.count(query.clone()).await?;
        let items = self.query(query).await?;
        Ok((items, total))
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}
