use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::Document;

/// A typed value compared against a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Int(i64::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

/// Comparison operator for a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Ne => "<>",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            FilterOp::Eq => ordering == Ordering::Equal,
            FilterOp::Ne => ordering != Ordering::Equal,
            FilterOp::Gt => ordering == Ordering::Greater,
            FilterOp::Gte => ordering != Ordering::Less,
            FilterOp::Lt => ordering == Ordering::Less,
            FilterOp::Lte => ordering != Ordering::Greater,
        }
    }
}

/// A filter on a single body field, addressed by a dotted path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub path: Vec<String>,
    pub op: FilterOp,
    pub value: FieldValue,
}

/// Case-insensitive substring search over several string fields.
///
/// A document matches when any of the fields contains the needle.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSearch {
    pub paths: Vec<Vec<String>>,
    pub needle: String,
}

/// Sort key for query results.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    CreatedAt,
    Int(Vec<String>),
    Str(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortOrder {
    pub key: SortKey,
    pub descending: bool,
}

/// Builder for constructing document queries.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    /// Collection to query.
    pub collection: String,

    /// All filters must match.
    pub filters: Vec<FieldFilter>,

    /// Optional text search.
    pub search: Option<TextSearch>,

    /// Documents created at or after this timestamp.
    pub created_from: Option<DateTime<Utc>>,

    /// Documents created at or before this timestamp.
    pub created_to: Option<DateTime<Utc>>,

    /// Sort keys applied in order; ties fall back to creation time.
    pub sort: Vec<SortOrder>,

    /// Maximum number of documents to return.
    pub limit: Option<usize>,

    /// Number of documents to skip.
    pub offset: Option<usize>,
}

/// Splits a dotted path (`"shipping_address.city"`) into segments.
pub fn path(dotted: &str) -> Vec<String> {
    dotted.split('.').map(str::to_string).collect()
}

impl DocumentQuery {
    /// Creates a query over every document in a collection.
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Adds a field filter.
    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<FieldValue>) -> Self {
        self.filters.push(FieldFilter {
            path: path(field),
            op,
            value: value.into(),
        });
        self
    }

    /// Adds an equality filter.
    pub fn eq(self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    /// Searches the given fields for a case-insensitive substring.
    pub fn search(mut self, fields: &[&str], needle: impl Into<String>) -> Self {
        self.search = Some(TextSearch {
            paths: fields.iter().map(|f| path(f)).collect(),
            needle: needle.into(),
        });
        self
    }

    /// Filters by creation timestamp (inclusive).
    pub fn created_between(
        mut self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_from = from;
        self.created_to = to;
        self
    }

    /// Appends a sort key.
    pub fn sort_by(mut self, key: SortKey, descending: bool) -> Self {
        self.sort.push(SortOrder { key, descending });
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips a number of results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Applies page-based pagination (pages start at 1).
    pub fn page(self, page: usize, per_page: usize) -> Self {
        let page = page.max(1);
        self.offset((page - 1) * per_page).limit(per_page)
    }

    /// Returns true if the document satisfies every filter of this query.
    pub fn matches(&self, doc: &Document) -> bool {
        if doc.collection != self.collection {
            return false;
        }
        if let Some(from) = self.created_from
            && doc.created_at < from
        {
            return false;
        }
        if let Some(to) = self.created_to
            && doc.created_at > to
        {
            return false;
        }
        if !self.filters.iter().all(|f| filter_matches(doc, f)) {
            return false;
        }
        if let Some(ref search) = self.search {
            let needle = search.needle.to_lowercase();
            return search.paths.iter().any(|p| {
                doc.field(p)
                    .and_then(|v| v.as_str())
                    .is_some_and(|s| s.to_lowercase().contains(&needle))
            });
        }
        true
    }

    /// Orders two documents by this query's sort keys.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for order in &self.sort {
            let ordering = match &order.key {
                SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
                SortKey::Int(p) => {
                    let av = a.field(p).and_then(|v| v.as_i64());
                    let bv = b.field(p).and_then(|v| v.as_i64());
                    av.cmp(&bv)
                }
                SortKey::Str(p) => {
                    let av = a.field(p).and_then(|v| v.as_str());
                    let bv = b.field(p).and_then(|v| v.as_str());
                    av.cmp(&bv)
                }
            };
            let ordering = if order.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
    }
}

fn filter_matches(doc: &Document, filter: &FieldFilter) -> bool {
    let Some(value) = doc.field(&filter.path) else {
        return false;
    };
    let ordering = match &filter.value {
        FieldValue::Int(expected) => value.as_i64().map(|v| v.cmp(expected)),
        FieldValue::Str(expected) => value.as_str().map(|v| v.cmp(expected.as_str())),
        FieldValue::Bool(expected) => value.as_bool().map(|v| v.cmp(expected)),
    };
    ordering.is_some_and(|o| filter.op.accepts(o))
}
