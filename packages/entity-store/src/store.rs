//! The storage contract all entity backends implement

use async_trait::async_trait;
use thiserror::Error;

use crate::Entity;

/// Errors from entity storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Entity not found
    #[error("entity not found: {entity_type}/{id}")]
    NotFound { entity_type: String, id: String },

    /// Create collided with an existing entity
    #[error("entity already exists: {entity_type}/{id}")]
    AlreadyExists { entity_type: String, id: String },

    /// Database query failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Metadata could not be serialized/deserialized
    #[error("metadata serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure (also used for injected test faults)
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Backend(_))
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Equality filter on a single metadata field
#[derive(Debug, Clone)]
pub struct MetadataFilter {
    /// Metadata field name
    pub field: String,
    /// Required value
    pub equals: serde_json::Value,
}

/// Sort order for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest first
    #[default]
    CreatedAsc,
    /// Newest first
    CreatedDesc,
}

/// Listing options for [`EntityStore::list`]
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Optional metadata equality filter
    pub filter: Option<MetadataFilter>,
    /// Sort order (default: oldest first)
    pub sort: SortOrder,
    /// Maximum number of entities to return
    pub limit: Option<i64>,
    /// Number of entities to skip
    pub offset: Option<i64>,
}

impl ListQuery {
    /// Query matching every entity of a type, oldest first
    pub fn all() -> Self {
        Self::default()
    }

    /// Query filtered on a metadata field value
    pub fn with_filter(field: impl Into<String>, equals: serde_json::Value) -> Self {
        Self {
            filter: Some(MetadataFilter {
                field: field.into(),
                equals,
            }),
            ..Self::default()
        }
    }
}

/// Typed CRUD over persisted entities.
///
/// Each operation is atomic at single-entity granularity; the contract makes
/// no cross-entity transactional guarantees.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch one entity, `None` if absent
    async fn get(&self, entity_type: &str, id: &str) -> StoreResult<Option<Entity>>;

    /// List entities of a type
    async fn list(&self, entity_type: &str, query: &ListQuery) -> StoreResult<Vec<Entity>>;

    /// Insert a new entity; fails with [`StoreError::AlreadyExists`] on collision
    async fn create(&self, entity: &Entity) -> StoreResult<String>;

    /// Replace an existing entity; fails with [`StoreError::NotFound`] if absent
    async fn update(&self, entity: &Entity) -> StoreResult<String>;

    /// Create-or-replace an entity
    async fn upsert(&self, entity: &Entity) -> StoreResult<()>;

    /// Delete an entity, returning whether one was actually removed
    async fn delete(&self, entity_type: &str, id: &str) -> StoreResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_retryable() {
        assert!(StoreError::Database(sqlx::Error::PoolClosed).is_retryable());
        assert!(StoreError::Backend("connection reset".to_string()).is_retryable());

        let not_found = StoreError::NotFound {
            entity_type: "post".to_string(),
            id: "p1".to_string(),
        };
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn test_list_query_with_filter() {
        let query = ListQuery::with_filter("series", serde_json::json!("AI"));
        let filter = query.filter.unwrap();
        assert_eq!(filter.field, "series");
        assert_eq!(filter.equals, serde_json::json!("AI"));
    }
}
