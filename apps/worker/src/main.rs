use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio_entity_store::{EntityStore, PgEntityStore};
use folio_ollama_client::OllamaClient;
use folio_worker::events::spawn_sync_subscription;
use folio_worker::jobs::{DeriveEntityHandler, GenerateInsightsHandler, SyncAggregatesHandler};
use folio_worker::{Config, EventBus, HandlerRegistry, JobQueue, QueueRunner, RedisProgress};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    tracing::info!("Starting Folio worker");

    let config = Config::from_env()?;

    let store = PgEntityStore::connect(config.database()).await?;
    store.ensure_schema().await?;
    let store: Arc<dyn EntityStore> = Arc::new(store);

    let redis_client = redis::Client::open(config.redis().connection_url())?;
    let ollama = Arc::new(OllamaClient::new(config.ollama())?);

    let events = EventBus::new();
    let queue = JobQueue::new(redis_client.clone(), config.redis());
    let progress = RedisProgress::spawn(redis_client, config.redis().clone());

    let mut registry = HandlerRegistry::new();
    registry.register(DeriveEntityHandler::new(store.clone(), events.clone()));
    registry.register(SyncAggregatesHandler::new(
        store.clone(),
        config.content().clone(),
    ));
    registry.register(GenerateInsightsHandler::new(
        store,
        ollama,
        events.clone(),
    ));
    let registry = Arc::new(registry);

    let _sync_subscription = spawn_sync_subscription(
        &events,
        queue.clone(),
        config.content().primary_type.clone(),
    );

    let runner = QueueRunner::new(queue, registry, progress, &config);
    runner.run().await?;

    Ok(())
}
