//! In-memory entity store for tests
//!
//! Mirrors the semantics of the Postgres store at single-entity
//! granularity, plus fault-injection hooks for exercising failure paths
//! (deletion-safety ordering, aborted rebuilds).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use folio_entity_store::{Entity, EntityStore, ListQuery, SortOrder, StoreError, StoreResult};

/// In-memory [`EntityStore`] implementation.
///
/// Cloning shares the underlying state, so a test can keep a handle while
/// a job owns another.
#[derive(Clone, Default)]
pub struct MemoryEntityStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    entities: RwLock<HashMap<(String, String), Entity>>,
    fail_next_create: AtomicBool,
    fail_next_upsert: AtomicBool,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryEntityStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity directly, bypassing counters and fault injection
    pub async fn seed(&self, entity: Entity) {
        let mut entities = self.inner.entities.write().unwrap();
        entities.insert((entity.entity_type.clone(), entity.id.clone()), entity);
    }

    /// Number of entities of a type currently stored
    pub fn count(&self, entity_type: &str) -> usize {
        let entities = self.inner.entities.read().unwrap();
        entities.keys().filter(|(t, _)| t == entity_type).count()
    }

    /// Ids of all entities of a type, sorted
    pub fn ids(&self, entity_type: &str) -> Vec<String> {
        let entities = self.inner.entities.read().unwrap();
        let mut ids: Vec<String> = entities
            .keys()
            .filter(|(t, _)| t == entity_type)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Make the next `create` call fail with an injected backend error
    pub fn fail_next_create(&self) {
        self.inner.fail_next_create.store(true, Ordering::SeqCst);
    }

    /// Make the next `upsert` call fail with an injected backend error
    pub fn fail_next_upsert(&self) {
        self.inner.fail_next_upsert.store(true, Ordering::SeqCst);
    }

    /// Number of times `create` was called
    pub fn create_calls(&self) -> usize {
        self.inner.create_calls.load(Ordering::SeqCst)
    }

    /// Number of times `update` was called
    pub fn update_calls(&self) -> usize {
        self.inner.update_calls.load(Ordering::SeqCst)
    }

    /// Number of times `upsert` was called
    pub fn upsert_calls(&self) -> usize {
        self.inner.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of times `delete` was called
    pub fn delete_calls(&self) -> usize {
        self.inner.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get(&self, entity_type: &str, id: &str) -> StoreResult<Option<Entity>> {
        let entities = self.inner.entities.read().unwrap();
        Ok(entities
            .get(&(entity_type.to_string(), id.to_string()))
            .cloned())
    }

    async fn list(&self, entity_type: &str, query: &ListQuery) -> StoreResult<Vec<Entity>> {
        let entities = self.inner.entities.read().unwrap();
        let mut matched: Vec<Entity> = entities
            .values()
            .filter(|e| e.entity_type == entity_type)
            .filter(|e| match &query.filter {
                Some(f) => e.metadata.get(&f.field) == Some(&f.equals),
                None => true,
            })
            .cloned()
            .collect();

        match query.sort {
            SortOrder::CreatedAsc => {
                matched.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)))
            }
            SortOrder::CreatedDesc => {
                matched.sort_by(|a, b| b.created.cmp(&a.created).then(a.id.cmp(&b.id)))
            }
        }

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let matched: Vec<Entity> = match query.limit {
            Some(limit) => matched
                .into_iter()
                .skip(offset)
                .take(limit.max(0) as usize)
                .collect(),
            None => matched.into_iter().skip(offset).collect(),
        };

        Ok(matched)
    }

    async fn create(&self, entity: &Entity) -> StoreResult<String> {
        self.inner.create_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected create failure".to_string()));
        }

        let mut entities = self.inner.entities.write().unwrap();
        let key = (entity.entity_type.clone(), entity.id.clone());
        if entities.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                entity_type: entity.entity_type.clone(),
                id: entity.id.clone(),
            });
        }

        entities.insert(key, entity.clone());
        Ok(entity.id.clone())
    }

    async fn update(&self, entity: &Entity) -> StoreResult<String> {
        self.inner.update_calls.fetch_add(1, Ordering::SeqCst);

        let mut entities = self.inner.entities.write().unwrap();
        let key = (entity.entity_type.clone(), entity.id.clone());
        if !entities.contains_key(&key) {
            return Err(StoreError::NotFound {
                entity_type: entity.entity_type.clone(),
                id: entity.id.clone(),
            });
        }

        entities.insert(key, entity.clone());
        Ok(entity.id.clone())
    }

    async fn upsert(&self, entity: &Entity) -> StoreResult<()> {
        self.inner.upsert_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_next_upsert.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected upsert failure".to_string()));
        }

        let mut entities = self.inner.entities.write().unwrap();
        let key = (entity.entity_type.clone(), entity.id.clone());
        let mut stored = entity.clone();
        // Matches the Postgres upsert: conflict keeps the original created stamp
        if let Some(existing) = entities.get(&key) {
            stored.created = existing.created;
        }
        entities.insert(key, stored);
        Ok(())
    }

    async fn delete(&self, entity_type: &str, id: &str) -> StoreResult<bool> {
        self.inner.delete_calls.fetch_add(1, Ordering::SeqCst);

        let mut entities = self.inner.entities.write().unwrap();
        Ok(entities
            .remove(&(entity_type.to_string(), id.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryEntityStore::new();
        let entity = fixtures::post("p1");

        store.create(&entity).await.unwrap();
        let fetched = store.get("post", "p1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "p1");
        assert_eq!(store.create_calls(), 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let store = MemoryEntityStore::new();
        store.create(&fixtures::post("p1")).await.unwrap();

        let result = store.create(&fixtures::post("p1")).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_same_id_different_types_no_collision() {
        let store = MemoryEntityStore::new();
        let post = fixtures::entity("shared", "post", "a post");
        let page = fixtures::entity("shared", "page", "a page");

        store.create(&post).await.unwrap();
        store.create(&page).await.unwrap();

        assert_eq!(store.count("post"), 1);
        assert_eq!(store.count("page"), 1);
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let store = MemoryEntityStore::new();
        let result = store.update(&fixtures::post("ghost")).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_returns_whether_removed() {
        let store = MemoryEntityStore::new();
        store.seed(fixtures::post("p1")).await;

        assert!(store.delete("post", "p1").await.unwrap());
        assert!(!store.delete("post", "p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filter_on_metadata() {
        let store = MemoryEntityStore::new();
        store.seed(fixtures::post_with_series("p1", "AI")).await;
        store.seed(fixtures::post_with_series("p2", "Rust")).await;
        store.seed(fixtures::post("p3")).await;

        let query = ListQuery::with_filter("series", serde_json::json!("AI"));
        let matched = store.list("post", &query).await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, "p1");
    }

    #[tokio::test]
    async fn test_fail_next_create_fires_once() {
        let store = MemoryEntityStore::new();
        store.fail_next_create();

        let result = store.create(&fixtures::post("p1")).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));

        // Subsequent create succeeds
        store.create(&fixtures::post("p1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_preserves_created() {
        let store = MemoryEntityStore::new();
        let original = fixtures::post("p1");
        let created = original.created;
        store.create(&original).await.unwrap();

        let mut replacement = fixtures::post("p1");
        replacement.set_content("# Rewritten");
        replacement.created = created + chrono::Duration::hours(1);
        store.upsert(&replacement).await.unwrap();

        let stored = store.get("post", "p1").await.unwrap().unwrap();
        assert_eq!(stored.created, created);
        assert_eq!(stored.content, "# Rewritten");
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let store = MemoryEntityStore::new();
        let clone = store.clone();

        clone.seed(fixtures::post("p1")).await;
        assert_eq!(store.count("post"), 1);
    }
}
