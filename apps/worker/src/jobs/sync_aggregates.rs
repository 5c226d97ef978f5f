//! Aggregate synchronization job
//!
//! Keeps the aggregate collection an exact function of the grouping keys
//! currently present on primary entities. Every trigger performs the same
//! full rebuild: group primaries by their grouping key, upsert one
//! deterministic aggregate per key, then delete every aggregate whose key
//! no longer has members. O(N + M) per rebuild; correctness over
//! scalability, and safe to coalesce or re-run at any time.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use folio_entity_store::{aggregate_id, Entity, EntityStore, ListQuery};
use folio_shared_config::ContentConfig;

use crate::error::WorkerResult;
use crate::registry::{JobContext, JobHandler};

pub const JOB_TYPE: &str = "sync_aggregates";

/// Rebuild request payload; carries only a diagnostic trigger reason
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncAggregatesJob {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Result payload for a rebuild
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub upserted: usize,
    pub deleted: usize,
}

pub struct SyncAggregatesHandler {
    store: Arc<dyn EntityStore>,
    rules: ContentConfig,
}

impl SyncAggregatesHandler {
    pub fn new(store: Arc<dyn EntityStore>, rules: ContentConfig) -> Self {
        Self { store, rules }
    }

    /// Build the deterministic aggregate entity for one grouping key.
    ///
    /// Content depends only on the key and member count, so repeated
    /// rebuilds over unchanged primaries produce identical content hashes.
    fn aggregate_for(&self, key: &str, members: usize) -> Entity {
        let id = aggregate_id(&self.rules.aggregate_prefix, key);
        let content = format!("# {}\n\n{} member entries.\n", key, members);

        let mut metadata = serde_json::Map::new();
        metadata.insert(
            self.rules.group_field.clone(),
            Value::String(key.to_string()),
        );
        metadata.insert("members".to_string(), Value::from(members));

        Entity::new(id, self.rules.aggregate_type.clone(), content, metadata)
    }
}

#[async_trait]
impl JobHandler for SyncAggregatesHandler {
    type Payload = SyncAggregatesJob;
    type Output = SyncOutcome;

    fn job_type(&self) -> &'static str {
        JOB_TYPE
    }

    async fn process(
        &self,
        payload: SyncAggregatesJob,
        ctx: &JobContext,
    ) -> WorkerResult<SyncOutcome> {
        tracing::info!(
            reason = payload.reason.as_deref().unwrap_or("manual"),
            primary_type = %self.rules.primary_type,
            aggregate_type = %self.rules.aggregate_type,
            "Rebuilding aggregates"
        );

        ctx.report(0, 3, "listing primary entities");
        let primaries = self
            .store
            .list(&self.rules.primary_type, &ListQuery::all())
            .await?;

        // Group by non-empty trimmed grouping key
        let mut groups: BTreeMap<String, usize> = BTreeMap::new();
        for entity in &primaries {
            let key = entity
                .metadata_str(&self.rules.group_field)
                .map(str::trim)
                .unwrap_or("");
            if key.is_empty() {
                continue;
            }
            *groups.entry(key.to_string()).or_insert(0) += 1;
        }

        ctx.report(1, 3, "writing aggregates");
        let mut processed: HashSet<String> = HashSet::new();
        for (key, members) in &groups {
            let aggregate = self.aggregate_for(key, *members);
            let id = aggregate.id.clone();
            self.store.upsert(&aggregate).await?;
            processed.insert(id);
        }

        ctx.report(2, 3, "cleaning orphans");
        let existing = self
            .store
            .list(&self.rules.aggregate_type, &ListQuery::all())
            .await?;

        let mut deleted = 0;
        for aggregate in existing {
            if processed.contains(&aggregate.id) {
                continue;
            }
            if self
                .store
                .delete(&self.rules.aggregate_type, &aggregate.id)
                .await?
            {
                tracing::debug!(aggregate_id = %aggregate.id, "Deleted orphaned aggregate");
                deleted += 1;
            }
        }

        ctx.report(3, 3, "done");
        tracing::info!(
            upserted = processed.len(),
            deleted = deleted,
            "Aggregate rebuild complete"
        );

        Ok(SyncOutcome {
            upserted: processed.len(),
            deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_content_is_deterministic() {
        let handler = SyncAggregatesHandler {
            store: Arc::new(folio_test_utils::MemoryEntityStore::new()),
            rules: ContentConfig::default(),
        };

        let a = handler.aggregate_for("AI", 3);
        let b = handler.aggregate_for("AI", 3);
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.id, "series-ai");
    }

    #[test]
    fn test_member_count_changes_content() {
        let handler = SyncAggregatesHandler {
            store: Arc::new(folio_test_utils::MemoryEntityStore::new()),
            rules: ContentConfig::default(),
        };

        let a = handler.aggregate_for("AI", 3);
        let b = handler.aggregate_for("AI", 4);
        assert_ne!(a.content_hash, b.content_hash);
    }
}
