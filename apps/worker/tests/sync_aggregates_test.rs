//! Integration tests for aggregate synchronization
//!
//! Exercises the full-rebuild algorithm: convergence, orphan cleanup,
//! grouping-key edge cases, and self-healing after an aborted rebuild.

mod common;

use std::sync::Arc;

use common::tracked_context;
use folio_entity_store::EntityStore;
use folio_shared_config::ContentConfig;
use folio_test_utils::{fixtures, MemoryEntityStore};
use folio_worker::jobs::sync_aggregates::SyncAggregatesJob;
use folio_worker::jobs::SyncAggregatesHandler;
use folio_worker::JobHandler;

fn handler(store: &MemoryEntityStore) -> SyncAggregatesHandler {
    SyncAggregatesHandler::new(Arc::new(store.clone()), ContentConfig::default())
}

async fn rebuild(store: &MemoryEntityStore) -> folio_worker::jobs::sync_aggregates::SyncOutcome {
    let (ctx, _) = tracked_context("sync-job");
    handler(store)
        .process(SyncAggregatesJob::default(), &ctx)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_created_primary_produces_aggregate() {
    // Scenario: a post tagged with series "AI" appears
    let store = MemoryEntityStore::new();
    store.seed(fixtures::post_with_series("p1", "AI")).await;

    let outcome = rebuild(&store).await;

    assert_eq!(outcome.upserted, 1);
    let aggregate = store.get("series", "series-ai").await.unwrap().unwrap();
    assert_eq!(aggregate.metadata["series"], "AI");
    assert_eq!(aggregate.metadata["members"], 1);
}

#[tokio::test]
async fn test_clearing_last_member_deletes_aggregate() {
    let store = MemoryEntityStore::new();
    store.seed(fixtures::post_with_series("p1", "AI")).await;
    rebuild(&store).await;
    assert!(store.get("series", "series-ai").await.unwrap().is_some());

    // p1 loses its series key; it was the only member
    store.seed(fixtures::post("p1")).await;
    let outcome = rebuild(&store).await;

    assert_eq!(outcome.deleted, 1);
    assert!(store.get("series", "series-ai").await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_rebuild_converges_to_identical_hashes() {
    let store = MemoryEntityStore::new();
    store.seed(fixtures::post_with_series("p1", "AI")).await;
    store.seed(fixtures::post_with_series("p2", "AI")).await;
    store.seed(fixtures::post_with_series("p3", "Rust")).await;

    rebuild(&store).await;
    let first_ai = store.get("series", "series-ai").await.unwrap().unwrap();
    let first_rust = store.get("series", "series-rust").await.unwrap().unwrap();

    rebuild(&store).await;
    let second_ai = store.get("series", "series-ai").await.unwrap().unwrap();
    let second_rust = store.get("series", "series-rust").await.unwrap().unwrap();

    assert_eq!(first_ai.content_hash, second_ai.content_hash);
    assert_eq!(first_rust.content_hash, second_rust.content_hash);
}

#[tokio::test]
async fn test_aggregate_set_matches_grouping_keys_exactly() {
    let store = MemoryEntityStore::new();
    store.seed(fixtures::post_with_series("p1", "AI")).await;
    store.seed(fixtures::post_with_series("p2", "Rust")).await;
    store.seed(fixtures::post_with_series("p3", "Rust")).await;
    store.seed(fixtures::post("p4")).await;
    // A stale aggregate from an earlier state
    store
        .seed(fixtures::entity("series-history", "series", "old"))
        .await;

    let outcome = rebuild(&store).await;

    assert_eq!(store.ids("series"), vec!["series-ai", "series-rust"]);
    assert_eq!(outcome.upserted, 2);
    assert_eq!(outcome.deleted, 1);
}

#[tokio::test]
async fn test_rename_orphans_old_aggregate() {
    let store = MemoryEntityStore::new();
    store.seed(fixtures::post_with_series("p1", "AI")).await;
    rebuild(&store).await;

    // Renaming the key produces a new aggregate id and orphans the old one
    store.seed(fixtures::post_with_series("p1", "Machine Learning")).await;
    rebuild(&store).await;

    assert!(store.get("series", "series-ai").await.unwrap().is_none());
    assert!(store
        .get("series", "series-machine-learning")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_blank_grouping_keys_are_excluded() {
    let store = MemoryEntityStore::new();
    let mut metadata = serde_json::Map::new();
    metadata.insert("series".to_string(), serde_json::json!("   "));
    store
        .seed(fixtures::entity_with_metadata("p1", "post", "body", metadata))
        .await;

    let mut metadata = serde_json::Map::new();
    metadata.insert("series".to_string(), serde_json::json!(""));
    store
        .seed(fixtures::entity_with_metadata("p2", "post", "body", metadata))
        .await;

    let outcome = rebuild(&store).await;

    assert_eq!(outcome.upserted, 0);
    assert_eq!(store.count("series"), 0);
}

#[tokio::test]
async fn test_grouping_key_is_trimmed_before_slugging() {
    let store = MemoryEntityStore::new();
    let mut metadata = serde_json::Map::new();
    metadata.insert("series".to_string(), serde_json::json!("  AI  "));
    store
        .seed(fixtures::entity_with_metadata("p1", "post", "body", metadata))
        .await;

    rebuild(&store).await;

    assert!(store.get("series", "series-ai").await.unwrap().is_some());
}

#[tokio::test]
async fn test_aborted_rebuild_self_heals_on_next_trigger() {
    let store = MemoryEntityStore::new();
    store.seed(fixtures::post_with_series("p1", "AI")).await;
    store.seed(fixtures::post_with_series("p2", "Rust")).await;

    store.fail_next_upsert();
    let (ctx, _) = tracked_context("sync-job");
    let result = handler(&store)
        .process(SyncAggregatesJob::default(), &ctx)
        .await;
    assert!(result.is_err());

    // The next rebuild converges regardless of how far the first one got
    let outcome = rebuild(&store).await;
    assert_eq!(outcome.upserted, 2);
    assert_eq!(store.ids("series"), vec!["series-ai", "series-rust"]);
}

#[tokio::test]
async fn test_rebuild_reports_monotonic_progress() {
    let store = MemoryEntityStore::new();
    store.seed(fixtures::post_with_series("p1", "AI")).await;

    let (ctx, progress) = tracked_context("sync-job");
    handler(&store)
        .process(SyncAggregatesJob::default(), &ctx)
        .await
        .unwrap();

    progress.assert_monotonic();
    let updates = progress.updates();
    assert!(updates.len() >= 2);
    assert_eq!(updates.last().unwrap().message, "done");
}
