//! Job handler contract and registry
//!
//! Every background operation implements [`JobHandler`] against a typed
//! payload. The registry erases handler types behind [`ErasedJobHandler`],
//! whose dispatch path enforces the job state machine: payloads are
//! validated before `process` ever runs, and a schema failure terminates
//! the job as `Rejected` without executing any user logic.
//!
//! The registry is built once at startup and passed by handle; there is no
//! process-wide handler state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{WorkerError, WorkerResult};
use crate::progress::{NullProgress, ProgressReporter, ProgressUpdate};

/// Per-job execution context: the job id plus its progress side channel
pub struct JobContext {
    pub job_id: String,
    progress: Arc<dyn ProgressReporter>,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>, progress: Arc<dyn ProgressReporter>) -> Self {
        Self {
            job_id: job_id.into(),
            progress,
        }
    }

    /// Context with no progress tracking, for internally-triggered jobs
    pub fn untracked(job_id: impl Into<String>) -> Self {
        Self::new(job_id, Arc::new(NullProgress))
    }

    /// Report a progress update (fire-and-forget)
    pub fn report(&self, progress: u64, total: u64, message: impl Into<String>) {
        self.progress
            .report(ProgressUpdate::new(progress, total, message));
    }
}

/// Contract every background operation implements.
///
/// `process` is only ever invoked with a payload that parsed successfully;
/// it must report progress at least at start and completion and must
/// propagate failures rather than swallow them. `on_error` is a
/// diagnostic-only hook that runs after a failure and never raises.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    type Payload: DeserializeOwned + Send;
    type Output: Serialize + Send;

    /// Queue name this handler is registered under
    fn job_type(&self) -> &'static str;

    async fn process(&self, payload: Self::Payload, ctx: &JobContext)
        -> WorkerResult<Self::Output>;

    async fn on_error(&self, error: &WorkerError, raw: &Value, job_id: &str) {
        error.log();
        tracing::debug!(job_id = %job_id, payload = %raw, "Job payload at failure");
    }
}

/// Terminal state of one dispatch attempt.
///
/// `Rejected` and `Failed` are both terminal but distinct: a rejected job
/// never ran handler logic, a failed one ran partially. Only failures
/// participate in retry policy.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Payload failed validation (or the job type is unknown); `process` was never called
    Rejected { reason: String },
    /// Handler completed; carries the serialized output
    Completed(Value),
    /// Handler ran and failed
    Failed(WorkerError),
}

/// Type-erased handler as stored in the registry
#[async_trait]
pub trait ErasedJobHandler: Send + Sync {
    fn job_type(&self) -> &'static str;

    /// Validate-and-parse the raw payload, then run the handler
    async fn dispatch(&self, raw: Value, ctx: &JobContext) -> DispatchOutcome;
}

#[async_trait]
impl<H: JobHandler> ErasedJobHandler for H {
    fn job_type(&self) -> &'static str {
        JobHandler::job_type(self)
    }

    async fn dispatch(&self, raw: Value, ctx: &JobContext) -> DispatchOutcome {
        let payload = match serde_json::from_value::<H::Payload>(raw.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                let error = WorkerError::InvalidPayload(e.to_string());
                tracing::warn!(
                    job_type = JobHandler::job_type(self),
                    job_id = %ctx.job_id,
                    error = %error,
                    "Rejecting job with invalid payload"
                );
                return DispatchOutcome::Rejected {
                    reason: error.to_string(),
                };
            }
        };

        match self.process(payload, ctx).await {
            Ok(output) => match serde_json::to_value(output) {
                Ok(value) => DispatchOutcome::Completed(value),
                Err(e) => DispatchOutcome::Failed(WorkerError::Internal(format!(
                    "failed to serialize job output: {}",
                    e
                ))),
            },
            Err(e) => {
                self.on_error(&e, &raw, &ctx.job_id).await;
                DispatchOutcome::Failed(e)
            }
        }
    }
}

/// Registry mapping job type names to their handlers
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn ErasedJobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its job type.
    ///
    /// Registering two handlers for the same job type is a wiring bug;
    /// the later registration replaces the earlier one with a warning.
    pub fn register<H: JobHandler>(&mut self, handler: H) {
        let job_type = JobHandler::job_type(&handler);
        if self
            .handlers
            .insert(job_type, Arc::new(handler))
            .is_some()
        {
            tracing::warn!(job_type = job_type, "Replaced existing job handler");
        }
    }

    /// Look up the handler for a job type
    pub fn get(&self, job_type: &str) -> Option<Arc<dyn ErasedJobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    /// Registered job type names
    pub fn job_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Dispatch a raw payload to the handler for `job_type`.
    ///
    /// Unknown job types are rejected without running anything.
    pub async fn dispatch(&self, job_type: &str, raw: Value, ctx: &JobContext) -> DispatchOutcome {
        match self.get(job_type) {
            Some(handler) => handler.dispatch(raw, ctx).await,
            None => {
                tracing::warn!(job_type = job_type, job_id = %ctx.job_id, "No handler for job type");
                DispatchOutcome::Rejected {
                    reason: WorkerError::UnknownJobType(job_type.to_string()).to_string(),
                }
            }
        }
    }
}
