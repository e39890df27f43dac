use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// Version number of a stored document, used for optimistic concurrency control.
///
/// A document is at version 1 once inserted and each replace increments it by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a document that has not been stored.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) assigned on insert.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A JSON document stored in a named collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Collection the document belongs to (e.g. `"orders"`).
    pub collection: String,

    /// Unique identifier within the collection.
    pub id: Uuid,

    /// Current stored version.
    pub version: Version,

    /// Secondary unique keys, name → value (e.g. `"sku"` → `"TS-001"`).
    ///
    /// Uniqueness is enforced per collection and key name.
    pub keys: BTreeMap<String, String>,

    /// The document body.
    pub body: serde_json::Value,

    /// When the document was first stored.
    pub created_at: DateTime<Utc>,

    /// When the document was last replaced.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Creates an unsaved document with the given body.
    pub fn new(collection: impl Into<String>, id: Uuid, body: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            collection: collection.into(),
            id,
            version: Version::initial(),
            keys: BTreeMap::new(),
            body,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an unsaved document by serializing `state`.
    pub fn from_state<T: Serialize>(
        collection: impl Into<String>,
        id: Uuid,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(collection, id, serde_json::to_value(state)?))
    }

    /// Adds a secondary unique key.
    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(name.into(), value.into());
        self
    }

    /// Overrides the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    /// Deserializes the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body.clone())
    }

    /// Looks up a value by dotted path segments.
    pub fn field(&self, path: &[String]) -> Option<&serde_json::Value> {
        path.iter()
            .try_fold(&self.body, |value, segment| value.get(segment.as_str()))
    }
}
