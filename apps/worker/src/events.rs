//! Entity lifecycle events and the aggregate resync subscription
//!
//! An in-process broadcast bus carries entity lifecycle events from
//! whatever mutates entities (derivation jobs here, host tooling in a full
//! deployment) to the subscription that keeps aggregates in sync. Publish
//! is non-blocking: a publisher never waits on subscribers, and a slow
//! subscriber observes lag rather than backpressure.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::WorkerResult;

/// Broadcast channel capacity; lagged receivers trigger a coalesced catch-up
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle event for a persisted entity
#[derive(Debug, Clone)]
pub enum EntityEvent {
    Created { entity_type: String, id: String },
    Updated { entity_type: String, id: String },
    Deleted { entity_type: String, id: String },
    /// One-shot signal that the initial content load finished
    InitialSyncCompleted,
}

impl EntityEvent {
    /// Entity type this event concerns, if any
    pub fn entity_type(&self) -> Option<&str> {
        match self {
            Self::Created { entity_type, .. }
            | Self::Updated { entity_type, .. }
            | Self::Deleted { entity_type, .. } => Some(entity_type),
            Self::InitialSyncCompleted => None,
        }
    }

    /// Stable event name for logging and job payloads
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "entity:created",
            Self::Updated { .. } => "entity:updated",
            Self::Deleted { .. } => "entity:deleted",
            Self::InitialSyncCompleted => "initial-sync:completed",
        }
    }
}

/// In-process pub/sub bus for entity events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EntityEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event without blocking.
    ///
    /// An event with no live subscribers is dropped; that is normal during
    /// startup and shutdown.
    pub fn publish(&self, event: EntityEvent) {
        let receivers = self.sender.receiver_count();
        if self.sender.send(event.clone()).is_err() {
            tracing::trace!(event = event.name(), "No subscribers for entity event");
        } else {
            tracing::trace!(event = event.name(), receivers, "Published entity event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntityEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink that schedules an aggregate resync; implemented by the job queue
#[async_trait]
pub trait SyncScheduler: Send + Sync + 'static {
    /// Enqueue one full aggregate rebuild, returning the job id
    async fn schedule_resync(&self, reason: &str) -> WorkerResult<String>;
}

/// Spawn the subscription that triggers aggregate synchronization.
///
/// Every create/update/delete of a `primary_type` entity, plus the
/// initial-sync signal, schedules a full rebuild. A lagged receiver
/// schedules a single catch-up rebuild, which is sufficient because
/// rebuilds are idempotent and coalesce.
pub fn spawn_sync_subscription<S: SyncScheduler>(
    bus: &EventBus,
    scheduler: S,
    primary_type: String,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let relevant = match &event {
                        EntityEvent::InitialSyncCompleted => true,
                        other => other.entity_type() == Some(primary_type.as_str()),
                    };
                    if !relevant {
                        continue;
                    }

                    tracing::debug!(event = event.name(), "Scheduling aggregate resync");
                    if let Err(e) = scheduler.schedule_resync(event.name()).await {
                        tracing::error!(error = %e, event = event.name(), "Failed to schedule aggregate resync");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscription lagged, scheduling catch-up resync");
                    if let Err(e) = scheduler.schedule_resync("catch-up").await {
                        tracing::error!(error = %e, "Failed to schedule catch-up resync");
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct CountingScheduler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SyncScheduler for CountingScheduler {
        async fn schedule_resync(&self, _reason: &str) -> WorkerResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("job-id".to_string())
        }
    }

    fn created(entity_type: &str, id: &str) -> EntityEvent {
        EntityEvent::Created {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(created("post", "p1"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(created("post", "p1"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "entity:created");
        assert_eq!(event.entity_type(), Some("post"));
    }

    #[tokio::test]
    async fn test_subscription_schedules_resync_for_primary_events_only() {
        let bus = EventBus::new();
        let scheduler = CountingScheduler::default();
        let calls = scheduler.calls.clone();

        let handle = spawn_sync_subscription(&bus, scheduler, "post".to_string());
        tokio::task::yield_now().await;

        bus.publish(created("post", "p1"));
        bus.publish(created("comment", "c1"));
        bus.publish(EntityEvent::Deleted {
            entity_type: "post".to_string(),
            id: "p1".to_string(),
        });
        bus.publish(EntityEvent::InitialSyncCompleted);

        // Give the subscription task time to drain
        for _ in 0..20 {
            if calls.load(Ordering::SeqCst) >= 3 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        handle.abort();
    }
}
