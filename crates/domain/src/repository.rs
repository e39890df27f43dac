//! Loading and persisting aggregates with optimistic concurrency.

use std::marker::PhantomData;

use document_store::{
    Document, DocumentQuery, DocumentStore, DocumentStoreExt, StoreError, WriteOptions,
};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::error::DomainError;

/// What a mutation did to the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R> {
    /// The aggregate changed and must be written.
    Changed(R),
    /// Nothing changed; the write is skipped.
    Unchanged(R),
}

/// Result of an update.
#[derive(Debug)]
pub struct UpdateResult<A, R> {
    /// The aggregate as stored after the update.
    pub aggregate: A,

    /// The value returned by the mutation.
    pub value: R,

    /// Whether a write happened.
    pub changed: bool,
}

/// Repository for one aggregate type.
///
/// Updates run a load → mutate → compare-and-swap cycle. When another writer
/// wins the race the mutation is re-run against the fresh state, so every
/// update of a single aggregate is applied in some serial order.
pub struct Repository<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    store: S,
    max_attempts: u32,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for Repository<S, A>
where
    S: DocumentStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            max_attempts: self.max_attempts,
            _phantom: PhantomData,
        }
    }
}

impl<S, A> Repository<S, A>
where
    S: DocumentStore,
    A: Aggregate,
{
    /// Creates a repository that tries each update up to `max_attempts` times.
    pub fn new(store: S, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn to_document(aggregate: &A) -> Result<Document, DomainError> {
        let mut doc = Document::from_state(A::collection(), aggregate.id(), aggregate)?
            .with_created_at(aggregate.created_at());
        for (name, value) in aggregate.unique_keys() {
            doc = doc.with_key(name, value);
        }
        doc.version = aggregate.version();
        Ok(doc)
    }

    fn from_document(doc: Document) -> Result<A, DomainError> {
        let mut aggregate: A = doc.decode()?;
        aggregate.set_version(doc.version);
        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load(&self, id: Uuid) -> Result<Option<A>, DomainError> {
        self.store
            .get(A::collection(), id)
            .await?
            .map(Self::from_document)
            .transpose()
    }

    /// Loads an aggregate, failing with `NotFound` if it doesn't exist.
    pub async fn load_required(&self, id: Uuid) -> Result<A, DomainError> {
        self.load(id)
            .await?
            .ok_or_else(|| DomainError::not_found(A::aggregate_type(), id))
    }

    /// Loads an aggregate by one of its unique keys.
    pub async fn find_by_key(&self, key: &str, value: &str) -> Result<Option<A>, DomainError> {
        self.store
            .find_by_key(A::collection(), key, value)
            .await?
            .map(Self::from_document)
            .transpose()
    }

    /// Persists a new aggregate.
    pub async fn insert(&self, aggregate: A) -> Result<A, DomainError> {
        let doc = Self::to_document(&aggregate)?;
        let stored = self.store.insert(doc).await?;
        let mut aggregate = aggregate;
        aggregate.set_version(stored.version);
        Ok(aggregate)
    }

    /// Runs a query over the aggregate's collection.
    pub async fn query(&self, query: DocumentQuery) -> Result<Vec<A>, DomainError> {
        self.store
            .query(query)
            .await?
            .into_iter()
            .map(Self::from_document)
            .collect()
    }

    /// Runs a paged query, returning the page and the total match count.
    pub async fn query_page(&self, query: DocumentQuery) -> Result<(Vec<A>, u64), DomainError> {
        let (docs, total) = self.store.query_page(query).await?;
        let items = docs
            .into_iter()
            .map(Self::from_document)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    /// Returns a query over the aggregate's collection.
    pub fn all(&self) -> DocumentQuery {
        DocumentQuery::collection(A::collection())
    }

    /// Applies a mutation and persists it with an expected-version check.
    ///
    /// The mutation may run more than once if a concurrent writer wins;
    /// it must only touch the aggregate it is given. Returning
    /// `Outcome::Unchanged` skips the write entirely.
    pub async fn update<F, R>(
        &self,
        id: Uuid,
        mut mutate: F,
    ) -> Result<UpdateResult<A, R>, DomainError>
    where
        F: FnMut(&mut A) -> Result<Outcome<R>, DomainError>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut aggregate = self.load_required(id).await?;
            let expected = aggregate.version();

            let value = match mutate(&mut aggregate)? {
                Outcome::Unchanged(value) => {
                    return Ok(UpdateResult {
                        aggregate,
                        value,
                        changed: false,
                    });
                }
                Outcome::Changed(value) => value,
            };

            let doc = Self::to_document(&aggregate)?;
            match self
                .store
                .replace(doc, WriteOptions::expect_version(expected))
                .await
            {
                Ok(stored) => {
                    aggregate.set_version(stored.version);
                    return Ok(UpdateResult {
                        aggregate,
                        value,
                        changed: true,
                    });
                }
                Err(StoreError::ConcurrencyConflict { .. }) if attempt < self.max_attempts => {
                    tracing::debug!(
                        aggregate_type = A::aggregate_type(),
                        %id,
                        attempt,
                        "version conflict, retrying"
                    );
                    tokio::task::yield_now().await;
                }
                Err(StoreError::ConcurrencyConflict { .. }) => {
                    metrics::counter!("write_conflicts_exhausted_total", "aggregate" => A::aggregate_type())
                        .increment(1);
                    return Err(DomainError::Conflict(format!(
                        "{} {id} was modified concurrently",
                        A::aggregate_type()
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use document_store::{InMemoryDocumentStore, Version};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Counter {
        id: Uuid,
        name: String,
        value: i64,
        created_at: DateTime<Utc>,
        #[serde(skip)]
        version: Version,
    }

    impl Counter {
        fn new(name: &str) -> Self {
            Self {
                id: Uuid::new_v4(),
                name: name.to_string(),
                value: 0,
                created_at: Utc::now(),
                version: Version::initial(),
            }
        }
    }

    impl Aggregate for Counter {
        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn collection() -> &'static str {
            "counters"
        }

        fn id(&self) -> Uuid {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }

        fn unique_keys(&self) -> Vec<(&'static str, String)> {
            vec![("name", self.name.clone())]
        }
    }

    fn repo() -> Repository<InMemoryDocumentStore, Counter> {
        Repository::new(InMemoryDocumentStore::new(), 8)
    }

    #[tokio::test]
    async fn insert_then_load() {
        let repo = repo();
        let counter = repo.insert(Counter::new("a")).await.unwrap();
        assert_eq!(counter.version, Version::first());

        let loaded = repo.load_required(counter.id).await.unwrap();
        assert_eq!(loaded.version, Version::first());
        assert_eq!(loaded.name, "a");

        let by_key = repo.find_by_key("name", "a").await.unwrap();
        assert_eq!(by_key.map(|c| c.id), Some(counter.id));
    }

    #[tokio::test]
    async fn load_required_missing_is_not_found() {
        let result = repo().load_required(Uuid::new_v4()).await;
        assert!(matches!(result, Err(DomainError::NotFound { kind: "Counter", .. })));
    }

    #[tokio::test]
    async fn update_persists_changes() {
        let repo = repo();
        let counter = repo.insert(Counter::new("a")).await.unwrap();

        let result = repo
            .update(counter.id, |c| {
                c.value += 5;
                Ok(Outcome::Changed(c.value))
            })
            .await
            .unwrap();

        assert!(result.changed);
        assert_eq!(result.value, 5);
        assert_eq!(result.aggregate.version, Version::new(2));
    }

    #[tokio::test]
    async fn unchanged_outcome_skips_write() {
        let repo = repo();
        let counter = repo.insert(Counter::new("a")).await.unwrap();

        let result = repo
            .update(counter.id, |_| Ok(Outcome::Unchanged(())))
            .await
            .unwrap();

        assert!(!result.changed);
        let loaded = repo.load_required(counter.id).await.unwrap();
        assert_eq!(loaded.version, Version::first());
    }

    #[tokio::test]
    async fn mutation_error_aborts_update() {
        let repo = repo();
        let counter = repo.insert(Counter::new("a")).await.unwrap();

        let result: Result<UpdateResult<Counter, ()>, _> = repo
            .update(counter.id, |_| {
                Err(DomainError::InvalidArgument("nope".into()))
            })
            .await;
        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_serialized() {
        let repo = Repository::<_, Counter>::new(InMemoryDocumentStore::new(), 1_000);
        let counter = repo.insert(Counter::new("a")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.update(counter.id, |c| {
                    c.value += 1;
                    Ok(Outcome::Changed(()))
                })
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let loaded = repo.load_required(counter.id).await.unwrap();
        assert_eq!(loaded.value, 16);
        assert_eq!(loaded.version, Version::new(17));
    }
}
