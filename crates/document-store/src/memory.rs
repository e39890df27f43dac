use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    Document, DocumentQuery, Result, StoreError, Version,
    store::{DocumentStore, DocumentStream, WriteOptions},
};

#[derive(Debug, Default)]
struct Collection {
    docs: HashMap<Uuid, Document>,
    /// (key name, key value) → document id
    keys: HashMap<(String, String), Uuid>,
}

impl Collection {
    fn check_keys(&self, name: &str, doc: &Document) -> Result<()> {
        for (key, value) in &doc.keys {
            if let Some(owner) = self.keys.get(&(key.clone(), value.clone()))
                && *owner != doc.id
            {
                return Err(StoreError::DuplicateKey {
                    collection: name.to_string(),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    fn index_keys(&mut self, doc: &Document) {
        for (key, value) in &doc.keys {
            self.keys.insert((key.clone(), value.clone()), doc.id);
        }
    }

    fn unindex_keys(&mut self, doc: &Document) {
        for (key, value) in &doc.keys {
            self.keys.remove(&(key.clone(), value.clone()));
        }
    }
}

/// In-memory document store.
///
/// Provides the same interface and versioning semantics as the PostgreSQL
/// implementation. Every write happens under a single lock, so version checks
/// and key checks are atomic.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of documents in a collection.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.docs.len())
            .unwrap_or(0)
    }

    /// Removes every document.
    pub async fn clear(&self) {
        self.collections.write().await.clear();
    }

    async fn matching(&self, query: &DocumentQuery) -> Vec<Document> {
        let collections = self.collections.read().await;
        let mut docs: Vec<Document> = collections
            .get(&query.collection)
            .map(|c| {
                c.docs
                    .values()
                    .filter(|d| query.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        docs.sort_by(|a, b| query.compare(a, b));
        docs
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, mut doc: Document) -> Result<Document> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(doc.collection.clone()).or_default();

        if collection.docs.contains_key(&doc.id) {
            return Err(StoreError::DuplicateKey {
                collection: doc.collection.clone(),
                key: "id".to_string(),
                value: doc.id.to_string(),
            });
        }
        collection.check_keys(&doc.collection, &doc)?;

        doc.version = Version::first();
        collection.index_keys(&doc);
        collection.docs.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.docs.get(&id))
            .cloned())
    }

    async fn find_by_key(
        &self,
        collection: &str,
        key: &str,
        value: &str,
    ) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| {
            c.keys
                .get(&(key.to_string(), value.to_string()))
                .and_then(|id| c.docs.get(id))
                .cloned()
        }))
    }

    async fn replace(&self, mut doc: Document, options: WriteOptions) -> Result<Document> {
        let mut collections = self.collections.write().await;
        let not_found = || StoreError::NotFound {
            collection: doc.collection.clone(),
            id: doc.id,
        };
        let collection = collections.get_mut(&doc.collection).ok_or_else(not_found)?;
        let current = collection.docs.get(&doc.id).cloned().ok_or_else(not_found)?;

        if let Some(expected) = options.expected_version
            && current.version != expected
        {
            return Err(StoreError::ConcurrencyConflict {
                collection: doc.collection.clone(),
                id: doc.id,
                expected,
                actual: current.version,
            });
        }
        collection.check_keys(&doc.collection, &doc)?;

        doc.version = current.version.next();
        doc.created_at = current.created_at;
        doc.updated_at = Utc::now();
        collection.unindex_keys(&current);
        collection.index_keys(&doc);
        collection.docs.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let docs = self.matching(&query).await;

        // Apply offset and limit
        let offset = query.offset.unwrap_or(0);
        let docs = docs.into_iter().skip(offset);
        let docs = if let Some(limit) = query.limit {
            docs.take(limit).collect()
        } else {
            docs.collect()
        };

        Ok(docs)
    }

    async fn count(&self, query: DocumentQuery) -> Result<u64> {
        Ok(self.matching(&query).await.len() as u64)
    }

    async fn stream_collection(&self, collection: &str) -> Result<DocumentStream> {
        use futures_util::stream;

        let docs = self
            .matching(&DocumentQuery::collection(collection))
            .await;
        Ok(Box::pin(stream::iter(docs.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FilterOp, SortKey, query::path};
    use futures_util::StreamExt;

    fn sku_doc(sku: &str, stock: i64) -> Document {
        Document::new(
            "products",
            Uuid::new_v4(),
            serde_json::json!({"sku": sku, "stock": stock}),
        )
        .with_key("sku", sku)
    }

    #[tokio::test]
    async fn insert_assigns_first_version() {
        let store = InMemoryDocumentStore::new();
        let stored = store.insert(sku_doc("A", 1)).await.unwrap();
        assert_eq!(stored.version, Version::first());
        assert_eq!(store.document_count("products").await, 1);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_key() {
        let store = InMemoryDocumentStore::new();
        store.insert(sku_doc("A", 1)).await.unwrap();

        let result = store.insert(sku_doc("A", 2)).await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateKey { ref key, .. }) if key == "sku"
        ));
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_id() {
        let store = InMemoryDocumentStore::new();
        let doc = store.insert(sku_doc("A", 1)).await.unwrap();

        let again = Document::new("products", doc.id, serde_json::json!({}));
        let result = store.insert(again).await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateKey { ref key, .. }) if key == "id"
        ));
    }

    #[tokio::test]
    async fn find_by_key_returns_owner() {
        let store = InMemoryDocumentStore::new();
        let doc = store.insert(sku_doc("A", 1)).await.unwrap();

        let found = store.find_by_key("products", "sku", "A").await.unwrap();
        assert_eq!(found.map(|d| d.id), Some(doc.id));
        assert!(
            store
                .find_by_key("products", "sku", "B")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn replace_with_stale_version_conflicts() {
        let store = InMemoryDocumentStore::new();
        let doc = store.insert(sku_doc("A", 1)).await.unwrap();

        let mut first = doc.clone();
        first.body["stock"] = serde_json::json!(5);
        let updated = store
            .replace(first, WriteOptions::expect_version(doc.version))
            .await
            .unwrap();
        assert_eq!(updated.version, Version::new(2));

        let mut stale = doc.clone();
        stale.body["stock"] = serde_json::json!(9);
        let result = store
            .replace(stale, WriteOptions::expect_version(doc.version))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { expected, actual, .. })
                if expected == Version::first() && actual == Version::new(2)
        ));
    }

    #[tokio::test]
    async fn replace_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let result = store.replace(sku_doc("A", 1), WriteOptions::new()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn replace_moves_unique_keys() {
        let store = InMemoryDocumentStore::new();
        let doc = store.insert(sku_doc("A", 1)).await.unwrap();

        let mut renamed = doc.clone();
        renamed.keys.insert("sku".into(), "B".into());
        store.replace(renamed, WriteOptions::new()).await.unwrap();

        assert!(store.find_by_key("products", "sku", "A").await.unwrap().is_none());
        assert!(store.find_by_key("products", "sku", "B").await.unwrap().is_some());
        // the old key is free again
        store.insert(sku_doc("A", 3)).await.unwrap();
    }

    #[tokio::test]
    async fn query_filters_sorts_and_paginates() {
        let store = InMemoryDocumentStore::new();
        for (sku, stock) in [("A", 7), ("B", 2), ("C", 0), ("D", 5)] {
            store.insert(sku_doc(sku, stock)).await.unwrap();
        }

        let query = DocumentQuery::collection("products")
            .filter("stock", FilterOp::Gt, 0i64)
            .sort_by(SortKey::Int(path("stock")), false);

        assert_eq!(store.count(query.clone()).await.unwrap(), 3);

        let page = store.query(query.offset(1).limit(1)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].body["sku"], "D");
    }

    #[tokio::test]
    async fn stream_collection_yields_all_documents() {
        let store = InMemoryDocumentStore::new();
        store.insert(sku_doc("A", 1)).await.unwrap();
        store.insert(sku_doc("B", 1)).await.unwrap();

        let stream = store.stream_collection("products").await.unwrap();
        let docs: Vec<_> = stream.collect().await;
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.is_ok()));
    }
}
