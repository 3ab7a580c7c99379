//! JSON document store on top of SQLite.
//!
//! Documents live in a single `documents` table keyed by `(collection, id)`.
//! Queries match top-level fields by equality through `json_extract`, so the
//! store never needs to know a collection's schema.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use quizdeck_core::Collection;

use super::hub::{Change, ChangeHub};

/// Errors that can occur during document store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to encode document {collection}/{id}: {source}")]
    Encode {
        collection: Collection,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to decode document {collection}/{id}: {source}")]
    Decode {
        collection: Collection,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Equality predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    field: String,
    value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// JSON path for the field. Quoting keeps field names out of the SQL text.
    fn path(&self) -> String {
        format!("$.\"{}\"", self.field.replace('"', "\\\""))
    }
}

/// A set of filters plus an optional result cap.
///
/// Results are always ordered by document id, so a capped query returns the
/// lowest matching ids.
#[derive(Debug, Clone, Default)]
pub struct Query {
    filters: Vec<Filter>,
    limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(field, value));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    fn where_clause(&self) -> String {
        let mut clause = String::from("collection = ?");
        for _ in &self.filters {
            clause.push_str(" AND json_extract(body, ?) = json_extract(?, '$')");
        }
        clause
    }
}

/// A stored document with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Decodes the body into a typed record.
    pub fn decode<T: DeserializeOwned>(self, collection: Collection) -> Result<T, StoreError> {
        let id = self.id;
        serde_json::from_value(self.data).map_err(|source| StoreError::Decode {
            collection,
            id,
            source,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    body: String,
}

impl DocumentRow {
    fn into_document(self, collection: Collection) -> Result<Document, StoreError> {
        match serde_json::from_str(&self.body) {
            Ok(data) => Ok(Document { id: self.id, data }),
            Err(source) => Err(StoreError::Decode {
                collection,
                id: self.id,
                source,
            }),
        }
    }
}

/// Handle to the document store.
///
/// Cheap to clone; all clones share the connection pool and change hub.
#[derive(Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
    hub: Arc<ChangeHub>,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            hub: Arc::new(ChangeHub::new()),
        }
    }

    /// Writes a whole document, replacing any existing body.
    pub async fn set<T: Serialize>(
        &self,
        collection: Collection,
        id: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            collection,
            id: id.to_string(),
            source,
        })?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (collection, id) DO UPDATE
            SET body = excluded.body, updated_at = excluded.updated_at
            "#,
        )
        .bind(collection.name())
        .bind(id)
        .bind(&body)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Wrote {}/{}", collection, id);
        self.hub.publish(Change::new(collection, id)).await;
        Ok(())
    }

    /// Writes a document under a generated id and returns the id.
    pub async fn add<T: Serialize>(
        &self,
        collection: Collection,
        value: &T,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.set(collection, &id, value).await?;
        Ok(id)
    }

    /// Reads one document. Returns `Ok(None)` if it doesn't exist.
    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<T>, StoreError> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM documents WHERE collection = ? AND id = ?")
                .bind(collection.name())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match body {
            Some(body) => serde_json::from_str(&body)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    collection,
                    id: id.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Sets one top-level field of an existing document.
    ///
    /// Returns `Ok(false)` when there is no such document; nothing is created.
    pub async fn update_field(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<bool, StoreError> {
        let filter = Filter::eq(field, value);
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"
            UPDATE documents
            SET body = json_set(body, ?, json(?)), updated_at = ?
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(filter.path())
        .bind(filter.value.to_string())
        .bind(&now)
        .bind(collection.name())
        .bind(id)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            tracing::debug!("Set {}/{}.{}", collection, id, field);
            self.hub.publish(Change::new(collection, id)).await;
        }
        Ok(updated)
    }

    /// Removes a document. Returns `Ok(false)` if it didn't exist.
    pub async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.name())
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::debug!("Deleted {}/{}", collection, id);
            self.hub.publish(Change::new(collection, id)).await;
        }
        Ok(deleted)
    }

    /// Returns every document in a collection matching the query.
    pub async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        let mut sql = format!(
            "SELECT id, body FROM documents WHERE {} ORDER BY id",
            query.where_clause()
        );
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut statement = sqlx::query_as::<_, DocumentRow>(&sql).bind(collection.name());
        for filter in &query.filters {
            statement = statement.bind(filter.path()).bind(filter.value.to_string());
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| row.into_document(collection))
            .collect()
    }

    /// Counts matching documents without reading their bodies.
    pub async fn count(&self, collection: Collection, query: &Query) -> Result<u64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM documents WHERE {}", query.where_clause());

        let mut statement = sqlx::query_scalar::<_, i64>(&sql).bind(collection.name());
        for filter in &query.filters {
            statement = statement.bind(filter.path()).bind(filter.value.to_string());
        }

        let count = statement.fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    /// Subscribes to write notifications for a collection.
    pub async fn watch(&self, collection: Collection) -> broadcast::Receiver<Change> {
        self.hub.subscribe(collection).await
    }

    /// Number of open watchers on a collection.
    pub async fn watcher_count(&self, collection: Collection) -> usize {
        self.hub.receiver_count(collection).await
    }
}
