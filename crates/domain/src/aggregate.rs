//! Aggregate trait for versioned documents.

use chrono::{DateTime, Utc};
use document_store::Version;
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// A consistency boundary persisted as one versioned document.
///
/// The stored version is not part of the serialized body; the repository
/// copies it in after loading and out after writing.
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync {
    /// Returns the aggregate type name (e.g. "Order").
    fn aggregate_type() -> &'static str;

    /// Returns the collection the aggregate is stored in.
    fn collection() -> &'static str;

    /// Returns the document id.
    fn id(&self) -> Uuid;

    /// Returns the version the aggregate was loaded at.
    fn version(&self) -> Version;

    /// Sets the version after loading or persisting.
    fn set_version(&mut self, version: Version);

    /// Returns the creation timestamp used for range queries.
    fn created_at(&self) -> DateTime<Utc>;

    /// Returns secondary unique keys (name, value).
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}
