//! Postgres-backed entity store
//!
//! Entities live in a single `entities` table keyed `(entity_type, id)` with
//! JSONB metadata. Upsert uses `ON CONFLICT` so concurrent writers of the
//! same aggregate id converge without a coordinating lock.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use folio_shared_config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::store::{EntityStore, ListQuery, SortOrder, StoreError, StoreResult};
use crate::Entity;

/// Postgres reference implementation of [`EntityStore`]
#[derive(Debug, Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

/// Row shape for the `entities` table
#[derive(Debug, sqlx::FromRow)]
struct EntityRow {
    id: String,
    entity_type: String,
    content: String,
    content_hash: String,
    metadata: serde_json::Value,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
}

impl EntityRow {
    fn into_entity(self) -> StoreResult<Entity> {
        let metadata = match self.metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(StoreError::Backend(format!(
                    "metadata for {}/{} is not an object: {}",
                    self.entity_type, self.id, other
                )))
            }
        };

        Ok(Entity {
            id: self.id,
            entity_type: self.entity_type,
            content: self.content,
            content_hash: self.content_hash,
            metadata,
            created: self.created,
            updated: self.updated,
        })
    }
}

impl PgEntityStore {
    /// Wrap an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the shared database configuration
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Create the `entities` table if it does not exist
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                entity_type  TEXT NOT NULL,
                id           TEXT NOT NULL,
                content      TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                metadata     JSONB NOT NULL DEFAULT '{}'::jsonb,
                created      TIMESTAMPTZ NOT NULL,
                updated      TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (entity_type, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the underlying pool (for host wiring)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn get(&self, entity_type: &str, id: &str) -> StoreResult<Option<Entity>> {
        let row: Option<EntityRow> = sqlx::query_as(
            "SELECT id, entity_type, content, content_hash, metadata, created, updated
             FROM entities WHERE entity_type = $1 AND id = $2",
        )
        .bind(entity_type)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(EntityRow::into_entity).transpose()
    }

    async fn list(&self, entity_type: &str, query: &ListQuery) -> StoreResult<Vec<Entity>> {
        let order = match query.sort {
            SortOrder::CreatedAsc => "created ASC, id ASC",
            SortOrder::CreatedDesc => "created DESC, id ASC",
        };

        // Metadata filter uses JSONB containment so the GIN-indexable form
        // stays available if an index is added later.
        let sql = format!(
            "SELECT id, entity_type, content, content_hash, metadata, created, updated
             FROM entities
             WHERE entity_type = $1
               AND ($2::jsonb IS NULL OR metadata @> $2)
             ORDER BY {}
             LIMIT $3 OFFSET $4",
            order
        );

        let filter_json: Option<serde_json::Value> = query.filter.as_ref().map(|f| {
            let mut map = serde_json::Map::new();
            map.insert(f.field.clone(), f.equals.clone());
            serde_json::Value::Object(map)
        });

        let rows: Vec<EntityRow> = sqlx::query_as(&sql)
            .bind(entity_type)
            .bind(filter_json)
            .bind(query.limit.unwrap_or(i64::MAX))
            .bind(query.offset.unwrap_or(0))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(EntityRow::into_entity).collect()
    }

    async fn create(&self, entity: &Entity) -> StoreResult<String> {
        let result = sqlx::query(
            "INSERT INTO entities (entity_type, id, content, content_hash, metadata, created, updated)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (entity_type, id) DO NOTHING",
        )
        .bind(&entity.entity_type)
        .bind(&entity.id)
        .bind(&entity.content)
        .bind(&entity.content_hash)
        .bind(serde_json::Value::Object(entity.metadata.clone()))
        .bind(entity.created)
        .bind(entity.updated)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                entity_type: entity.entity_type.clone(),
                id: entity.id.clone(),
            });
        }

        Ok(entity.id.clone())
    }

    async fn update(&self, entity: &Entity) -> StoreResult<String> {
        let result = sqlx::query(
            "UPDATE entities
             SET content = $3, content_hash = $4, metadata = $5, updated = $6
             WHERE entity_type = $1 AND id = $2",
        )
        .bind(&entity.entity_type)
        .bind(&entity.id)
        .bind(&entity.content)
        .bind(&entity.content_hash)
        .bind(serde_json::Value::Object(entity.metadata.clone()))
        .bind(entity.updated)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity_type: entity.entity_type.clone(),
                id: entity.id.clone(),
            });
        }

        Ok(entity.id.clone())
    }

    async fn upsert(&self, entity: &Entity) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO entities (entity_type, id, content, content_hash, metadata, created, updated)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (entity_type, id) DO UPDATE SET
                 content = EXCLUDED.content,
                 content_hash = EXCLUDED.content_hash,
                 metadata = EXCLUDED.metadata,
                 updated = EXCLUDED.updated",
        )
        .bind(&entity.entity_type)
        .bind(&entity.id)
        .bind(&entity.content)
        .bind(&entity.content_hash)
        .bind(serde_json::Value::Object(entity.metadata.clone()))
        .bind(entity.created)
        .bind(entity.updated)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, entity_type: &str, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM entities WHERE entity_type = $1 AND id = $2")
            .bind(entity_type)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
