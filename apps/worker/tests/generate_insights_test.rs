//! Integration tests for the AI insight generation job
//!
//! Uses MockOllamaServer so no real Ollama instance is needed.

mod common;

use std::sync::Arc;

use common::tracked_context;
use folio_entity_store::EntityStore;
use folio_ollama_client::OllamaClient;
use folio_shared_config::OllamaConfig;
use folio_test_utils::{fixtures, MemoryEntityStore, MockOllamaServer};
use folio_worker::jobs::generate_insights::GenerateInsightsJob;
use folio_worker::jobs::GenerateInsightsHandler;
use folio_worker::{EventBus, JobHandler, WorkerError};

fn handler(store: &MemoryEntityStore, server: &MockOllamaServer) -> GenerateInsightsHandler {
    let config = OllamaConfig::with_url(server.url());
    let client = OllamaClient::new(&config).unwrap().with_retry_config(1, 1);
    GenerateInsightsHandler::new(Arc::new(store.clone()), Arc::new(client), EventBus::new())
}

fn insights_job(entity_id: &str, force: bool) -> GenerateInsightsJob {
    GenerateInsightsJob {
        entity_id: entity_id.to_string(),
        entity_type: "post".to_string(),
        force,
    }
}

#[tokio::test]
async fn test_generates_and_merges_insights() {
    let server = MockOllamaServer::start().await;
    server
        .mock_insights(&["rust", "async"], "A post about async Rust.", "neutral")
        .await;

    let store = MemoryEntityStore::new();
    store.seed(fixtures::post("p1")).await;

    let (ctx, progress) = tracked_context("job-1");
    let outcome = handler(&store, &server)
        .process(insights_job("p1", false), &ctx)
        .await
        .unwrap();

    assert!(outcome.generated);
    let entity = store.get("post", "p1").await.unwrap().unwrap();
    assert_eq!(
        entity.metadata_str("summary"),
        Some("A post about async Rust.")
    );
    assert_eq!(entity.metadata["tags"], serde_json::json!(["rust", "async"]));
    assert_eq!(entity.metadata["tone"], serde_json::json!("neutral"));

    progress.assert_monotonic();
}

#[tokio::test]
async fn test_existing_insights_are_kept_unless_forced() {
    let server = MockOllamaServer::start().await;
    server
        .mock_insights(&["fresh"], "Fresh summary.", "formal")
        .await;

    let store = MemoryEntityStore::new();
    let mut metadata = serde_json::Map::new();
    metadata.insert("summary".to_string(), serde_json::json!("Old summary."));
    store
        .seed(fixtures::entity_with_metadata("p1", "post", "body", metadata))
        .await;

    let handler = handler(&store, &server);

    let (ctx, _) = tracked_context("job-1");
    let outcome = handler.process(insights_job("p1", false), &ctx).await.unwrap();
    assert!(!outcome.generated);
    let entity = store.get("post", "p1").await.unwrap().unwrap();
    assert_eq!(entity.metadata_str("summary"), Some("Old summary."));

    // Force regenerates
    let outcome = handler.process(insights_job("p1", true), &ctx).await.unwrap();
    assert!(outcome.generated);
    let entity = store.get("post", "p1").await.unwrap().unwrap();
    assert_eq!(entity.metadata_str("summary"), Some("Fresh summary."));
}

#[tokio::test]
async fn test_missing_entity_fails_with_not_found() {
    let server = MockOllamaServer::start().await;
    let store = MemoryEntityStore::new();

    let (ctx, _) = tracked_context("job-1");
    let result = handler(&store, &server)
        .process(insights_job("ghost", false), &ctx)
        .await;

    assert!(matches!(result, Err(WorkerError::NotFound(_))));
}

#[tokio::test]
async fn test_non_json_response_fails_generation() {
    let server = MockOllamaServer::start().await;
    server.mock_chat_success("I cannot analyze this document.").await;

    let store = MemoryEntityStore::new();
    store.seed(fixtures::post("p1")).await;

    let (ctx, _) = tracked_context("job-1");
    let result = handler(&store, &server)
        .process(insights_job("p1", false), &ctx)
        .await;

    assert!(matches!(result, Err(WorkerError::InsightsGeneration(_))));
    // Entity left untouched on failure
    let entity = store.get("post", "p1").await.unwrap().unwrap();
    assert!(entity.metadata_str("summary").is_none());
}

#[tokio::test]
async fn test_model_not_found_maps_to_typed_error() {
    let server = MockOllamaServer::start().await;
    server.mock_model_not_found().await;

    let store = MemoryEntityStore::new();
    store.seed(fixtures::post("p1")).await;

    let (ctx, _) = tracked_context("job-1");
    let result = handler(&store, &server)
        .process(insights_job("p1", false), &ctx)
        .await;

    assert!(matches!(result, Err(WorkerError::OllamaModelNotFound(_))));
}
