//! Content derivation job
//!
//! Copies an entity from one type to another, or deletes it. The portable
//! fields (content + metadata) move; identity fields stay with the target.
//! Target creation always precedes source deletion, so a mid-job failure
//! never destroys data without a replacement existing. Entity events are
//! published fire-and-forget; the downstream aggregate resync is eventually
//! consistent rather than awaited, so a single worker never waits on its
//! own queue.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use folio_entity_store::EntityStore;

use crate::error::{WorkerError, WorkerResult};
use crate::events::{EntityEvent, EventBus};
use crate::registry::{JobContext, JobHandler};

pub const JOB_TYPE: &str = "derive_entity";

/// Entity types whose ids follow the `"type:group:slot"` composite layout.
/// Deriving one of these rewrites the leading tag to the target type.
const COMPOSITE_ID_TYPES: &[&str] = &["block"];

/// Derivation request payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveEntityJob {
    /// Source entity id
    pub entity_id: String,
    /// Type the source lives under
    pub source_entity_type: String,
    /// Type to derive into; `None` deletes the source without deriving
    #[serde(default)]
    pub target_entity_type: Option<String>,
    #[serde(default)]
    pub options: DeriveOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeriveOptions {
    /// Delete the source entity after the target is written
    #[serde(default)]
    pub delete_source: bool,
}

/// Result payload for a derivation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveOutcome {
    /// Target id for a derivation, source id for a deletion
    pub entity_id: String,
    /// For deletions, whether an entity was actually removed
    pub success: bool,
}

pub struct DeriveEntityHandler {
    store: Arc<dyn EntityStore>,
    events: EventBus,
}

impl DeriveEntityHandler {
    pub fn new(store: Arc<dyn EntityStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    async fn derive(
        &self,
        job: &DeriveEntityJob,
        target_type: &str,
        ctx: &JobContext,
    ) -> WorkerResult<DeriveOutcome> {
        ctx.report(0, 3, "deriving");

        let source = self
            .store
            .get(&job.source_entity_type, &job.entity_id)
            .await?
            .ok_or_else(|| {
                WorkerError::NotFound(format!(
                    "source entity {}/{} not found",
                    job.source_entity_type, job.entity_id
                ))
            })?;

        let target_id = target_id_for(&job.entity_id, &job.source_entity_type, target_type);

        ctx.report(1, 3, "writing target");
        match self.store.get(target_type, &target_id).await? {
            Some(mut target) => {
                target.apply_portable_fields(&source);
                self.store.update(&target).await?;
                tracing::info!(
                    source = %format!("{}/{}", job.source_entity_type, job.entity_id),
                    target = %format!("{}/{}", target_type, target_id),
                    "Updated existing derivation target"
                );
                self.events.publish(EntityEvent::Updated {
                    entity_type: target_type.to_string(),
                    id: target_id.clone(),
                });
            }
            None => {
                let target = source.derive_as(&target_id, target_type);
                self.store.create(&target).await?;
                tracing::info!(
                    source = %format!("{}/{}", job.source_entity_type, job.entity_id),
                    target = %format!("{}/{}", target_type, target_id),
                    "Created derivation target"
                );
                self.events.publish(EntityEvent::Created {
                    entity_type: target_type.to_string(),
                    id: target_id.clone(),
                });
            }
        }

        // Target is durable at this point; only now may the source go away
        if job.options.delete_source {
            ctx.report(2, 3, "deleting source");
            let removed = self
                .store
                .delete(&job.source_entity_type, &job.entity_id)
                .await?;
            if removed {
                self.events.publish(EntityEvent::Deleted {
                    entity_type: job.source_entity_type.clone(),
                    id: job.entity_id.clone(),
                });
            }
        }

        ctx.report(3, 3, "done");
        Ok(DeriveOutcome {
            entity_id: target_id,
            success: true,
        })
    }

    async fn delete_only(
        &self,
        job: &DeriveEntityJob,
        ctx: &JobContext,
    ) -> WorkerResult<DeriveOutcome> {
        ctx.report(0, 1, "deleting");

        let removed = self
            .store
            .delete(&job.source_entity_type, &job.entity_id)
            .await?;

        if removed {
            self.events.publish(EntityEvent::Deleted {
                entity_type: job.source_entity_type.clone(),
                id: job.entity_id.clone(),
            });
        } else {
            tracing::debug!(
                entity = %format!("{}/{}", job.source_entity_type, job.entity_id),
                "Delete requested for absent entity"
            );
        }

        ctx.report(1, 1, "done");
        Ok(DeriveOutcome {
            entity_id: job.entity_id.clone(),
            success: removed,
        })
    }
}

#[async_trait]
impl JobHandler for DeriveEntityHandler {
    type Payload = DeriveEntityJob;
    type Output = DeriveOutcome;

    fn job_type(&self) -> &'static str {
        JOB_TYPE
    }

    async fn process(
        &self,
        payload: DeriveEntityJob,
        ctx: &JobContext,
    ) -> WorkerResult<DeriveOutcome> {
        match payload.target_entity_type.clone() {
            Some(target_type) => self.derive(&payload, &target_type, ctx).await,
            None => self.delete_only(&payload, ctx).await,
        }
    }
}

/// Compute the target id, rewriting composite ids for the block family
fn target_id_for(entity_id: &str, source_type: &str, target_type: &str) -> String {
    if COMPOSITE_ID_TYPES.contains(&source_type) {
        let parts: Vec<&str> = entity_id.splitn(3, ':').collect();
        if parts.len() == 3 && parts.iter().all(|p| !p.is_empty()) {
            return format!("{}:{}:{}", target_type, parts[1], parts[2]);
        }
    }
    entity_id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("block:route1:hero", "block", "widget", "widget:route1:hero")]
    #[case("note-42", "post", "page", "note-42")]
    // A colon-separated id on a non-composite type is just an id
    #[case("post:route1:hero", "post", "page", "post:route1:hero")]
    // Malformed composite ids pass through unchanged
    #[case("block:route1", "block", "widget", "block:route1")]
    #[case("block::hero", "block", "widget", "block::hero")]
    fn test_target_id_rewrite(
        #[case] entity_id: &str,
        #[case] source_type: &str,
        #[case] target_type: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(target_id_for(entity_id, source_type, target_type), expected);
    }

    #[test]
    fn test_options_default_to_no_delete() {
        let job: DeriveEntityJob = serde_json::from_str(
            r#"{"entity_id":"p1","source_entity_type":"post"}"#,
        )
        .unwrap();
        assert!(!job.options.delete_source);
        assert!(job.target_entity_type.is_none());
    }
}
