//! Folio background job processor
//!
//! Runs the asynchronous half of the Folio content platform: content
//! derivation between entity types, aggregate collection synchronization,
//! and AI insight generation. Jobs arrive on a Redis queue, are validated
//! against typed payloads, and report progress over a side channel.

pub mod config;
pub mod error;
pub mod events;
pub mod jobs;
pub mod progress;
pub mod queue;
pub mod registry;

pub use config::Config;
pub use error::{ErrorSeverity, JobResult, WorkerError, WorkerResult};
pub use events::{EntityEvent, EventBus};
pub use progress::{NullProgress, ProgressReporter, ProgressUpdate, RedisProgress};
pub use queue::{JobEnvelope, JobQueue, QueueRunner};
pub use registry::{DispatchOutcome, HandlerRegistry, JobContext, JobHandler};
