use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Document, DocumentQuery, FieldValue, Result, SortKey, StoreError, Version,
    store::{DocumentStore, DocumentStream, WriteOptions},
};

const SELECT_COLUMNS: &str = r#"
    SELECT d.collection, d.id, d.version, d.body, d.created_at, d.updated_at,
           COALESCE(
               (SELECT jsonb_object_agg(k.key_name, k.key_value)
                FROM document_keys k
                WHERE k.collection = d.collection AND k.document_id = d.id),
               '{}'::jsonb
           ) AS keys
    FROM documents d
"#;

/// A bind parameter collected while building a dynamic query.
enum Arg {
    Text(String),
    Path(Vec<String>),
    Int(i64),
    Timestamp(DateTime<Utc>),
    Limit(i64),
}

/// PostgreSQL-backed document store.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        tracing::debug!(size = pool.size(), "postgres pool connected");
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("document store migrations applied");
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        let keys_json: serde_json::Value = row.try_get("keys")?;
        let keys: BTreeMap<String, String> = serde_json::from_value(keys_json)?;

        Ok(Document {
            collection: row.try_get("collection")?,
            id: row.try_get::<Uuid, _>("id")?,
            version: Version::new(row.try_get("version")?),
            keys,
            body: row.try_get("body")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn insert_keys(tx: &mut Transaction<'_, Postgres>, doc: &Document) -> Result<()> {
        for (key, value) in &doc.keys {
            sqlx::query(
                r#"
                INSERT INTO document_keys (collection, key_name, key_value, document_id)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(&doc.collection)
            .bind(key)
            .bind(value)
            .bind(doc.id)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_document_key")
                {
                    return StoreError::DuplicateKey {
                        collection: doc.collection.clone(),
                        key: key.clone(),
                        value: value.clone(),
                    };
                }
                StoreError::Database(e)
            })?;
        }
        Ok(())
    }

    /// Appends the WHERE clause for `query` and collects its bind arguments.
    fn push_conditions(query: &DocumentQuery, sql: &mut String, args: &mut Vec<Arg>) {
        args.push(Arg::Text(query.collection.clone()));
        sql.push_str(&format!(" WHERE d.collection = ${}", args.len()));

        for filter in &query.filters {
            args.push(Arg::Path(filter.path.clone()));
            let path_param = args.len();
            let op = filter.op.as_sql();
            match &filter.value {
                FieldValue::Int(v) => {
                    args.push(Arg::Int(*v));
                    sql.push_str(&format!(
                        " AND (d.body #>> ${path_param}::text[])::bigint {op} ${}",
                        args.len()
                    ));
                }
                FieldValue::Str(v) => {
                    args.push(Arg::Text(v.clone()));
                    sql.push_str(&format!(
                        " AND (d.body #>> ${path_param}::text[]) {op} ${}",
                        args.len()
                    ));
                }
                FieldValue::Bool(v) => {
                    args.push(Arg::Text(v.to_string()));
                    sql.push_str(&format!(
                        " AND (d.body #>> ${path_param}::text[]) {op} ${}",
                        args.len()
                    ));
                }
            }
        }

        if let Some(ref search) = query.search {
            args.push(Arg::Text(format!("%{}%", escape_like(&search.needle))));
            let needle_param = args.len();
            let mut clauses = Vec::with_capacity(search.paths.len());
            for path in &search.paths {
                args.push(Arg::Path(path.clone()));
                clauses.push(format!(
                    "(d.body #>> ${}::text[]) ILIKE ${needle_param}",
                    args.len()
                ));
            }
            if clauses.is_empty() {
                sql.push_str(" AND FALSE");
            } else {
                sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
            }
        }

        if let Some(from) = query.created_from {
            args.push(Arg::Timestamp(from));
            sql.push_str(&format!(" AND d.created_at >= ${}", args.len()));
        }
        if let Some(to) = query.created_to {
            args.push(Arg::Timestamp(to));
            sql.push_str(&format!(" AND d.created_at <= ${}", args.len()));
        }
    }

    fn push_order(query: &DocumentQuery, sql: &mut String, args: &mut Vec<Arg>) {
        let mut terms = Vec::with_capacity(query.sort.len() + 2);
        for order in &query.sort {
            let direction = if order.descending { "DESC" } else { "ASC" };
            let expr = match &order.key {
                SortKey::CreatedAt => "d.created_at".to_string(),
                SortKey::Int(path) => {
                    args.push(Arg::Path(path.clone()));
                    format!("(d.body #>> ${}::text[])::bigint", args.len())
                }
                SortKey::Str(path) => {
                    args.push(Arg::Path(path.clone()));
                    format!("(d.body #>> ${}::text[])", args.len())
                }
            };
            terms.push(format!("{expr} {direction}"));
        }
        terms.push("d.created_at ASC".to_string());
        terms.push("d.id ASC".to_string());
        sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));

        if let Some(limit) = query.limit {
            args.push(Arg::Limit(limit as i64));
            sql.push_str(&format!(" LIMIT ${}", args.len()));
        }
        if let Some(offset) = query.offset {
            args.push(Arg::Limit(offset as i64));
            sql.push_str(&format!(" OFFSET ${}", args.len()));
        }
    }

    fn bind_all<'q>(
        mut q: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
        args: Vec<Arg>,
    ) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
        for arg in args {
            q = match arg {
                Arg::Text(v) => q.bind(v),
                Arg::Path(v) => q.bind(v),
                Arg::Int(v) | Arg::Limit(v) => q.bind(v),
                Arg::Timestamp(v) => q.bind(v),
            };
        }
        q
    }

    async fn current_version(&self, collection: &str, id: Uuid) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.map(Version::new))
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert(&self, mut doc: Document) -> Result<Document> {
        doc.version = Version::first();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, version, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&doc.collection)
        .bind(doc.id)
        .bind(doc.version.as_i64())
        .bind(&doc.body)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("documents_pkey")
            {
                return StoreError::DuplicateKey {
                    collection: doc.collection.clone(),
                    key: "id".to_string(),
                    value: doc.id.to_string(),
                };
            }
            StoreError::Database(e)
        })?;

        Self::insert_keys(&mut tx, &doc).await?;

        tx.commit().await?;
        Ok(doc)
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>> {
        let sql = format!("{SELECT_COLUMNS} WHERE d.collection = $1 AND d.id = $2");
        let row = sqlx::query(&sql)
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn find_by_key(
        &self,
        collection: &str,
        key: &str,
        value: &str,
    ) -> Result<Option<Document>> {
        let sql = format!(
            r#"{SELECT_COLUMNS}
            JOIN document_keys dk ON dk.collection = d.collection AND dk.document_id = d.id
            WHERE dk.collection = $1 AND dk.key_name = $2 AND dk.key_value = $3"#
        );
        let row = sqlx::query(&sql)
            .bind(collection)
            .bind(key)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn replace(&self, mut doc: Document, options: WriteOptions) -> Result<Document> {
        let mut tx = self.pool.begin().await?;

        // Conditional update: the version check and the write are one statement
        let row = sqlx::query(
            r#"
            UPDATE documents
            SET version = version + 1, body = $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
              AND ($4::bigint IS NULL OR version = $4)
            RETURNING version, created_at, updated_at
            "#,
        )
        .bind(&doc.collection)
        .bind(doc.id)
        .bind(&doc.body)
        .bind(options.expected_version.map(|v| v.as_i64()))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            drop(tx);
            return match self.current_version(&doc.collection, doc.id).await? {
                None => Err(StoreError::NotFound {
                    collection: doc.collection,
                    id: doc.id,
                }),
                Some(actual) => {
                    tracing::debug!(collection = %doc.collection, id = %doc.id, %actual, "version mismatch on replace");
                    Err(StoreError::ConcurrencyConflict {
                        collection: doc.collection,
                        id: doc.id,
                        expected: options.expected_version.unwrap_or(actual),
                        actual,
                    })
                }
            };
        };

        doc.version = Version::new(row.try_get("version")?);
        doc.created_at = row.try_get("created_at")?;
        doc.updated_at = row.try_get("updated_at")?;

        sqlx::query("DELETE FROM document_keys WHERE collection = $1 AND document_id = $2")
            .bind(&doc.collection)
            .bind(doc.id)
            .execute(&mut *tx)
            .await?;
        Self::insert_keys(&mut tx, &doc).await?;

        tx.commit().await?;
        Ok(doc)
    }

    async fn query(&self, query: DocumentQuery) -> Result<Vec<Document>> {
        let mut sql = String::from(SELECT_COLUMNS);
        let mut args = Vec::new();
        Self::push_conditions(&query, &mut sql, &mut args);
        Self::push_order(&query, &mut sql, &mut args);

        let rows = Self::bind_all(sqlx::query(&sql), args)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn count(&self, query: DocumentQuery) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) AS total FROM documents d");
        let mut args = Vec::new();
        Self::push_conditions(&query, &mut sql, &mut args);

        let row = Self::bind_all(sqlx::query(&sql), args)
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }

    async fn stream_collection(&self, collection: &str) -> Result<DocumentStream> {
        use futures_util::stream;

        let docs = self.query(DocumentQuery::collection(collection)).await?;
        Ok(Box::pin(stream::iter(docs.into_iter().map(Ok))))
    }
}
