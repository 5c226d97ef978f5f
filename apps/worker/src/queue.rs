//! Redis-backed job queue and the worker run loop
//!
//! Jobs travel as JSON envelopes on a single Redis list: producers LPUSH,
//! the runner BRPOPs with a poll timeout. Dispatch goes through the handler
//! registry under a concurrency semaphore; retryable failures are
//! re-enqueued with exponential backoff up to the configured attempt limit.
//! Rejected jobs are terminal and never retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Semaphore;
use uuid::Uuid;

use folio_shared_config::RedisConfig;

use crate::config::Config;
use crate::error::{JobResult, WorkerError, WorkerResult};
use crate::events::SyncScheduler;
use crate::jobs;
use crate::progress::RedisProgress;
use crate::registry::{DispatchOutcome, HandlerRegistry, JobContext};

/// Wire format for one queued job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job_type: String,
    pub data: Value,
    pub job_id: String,
    /// Completed attempts so far; zero for a fresh job
    #[serde(default)]
    pub attempts: u32,
}

/// Producer/consumer handle for the Redis job list
#[derive(Clone)]
pub struct JobQueue {
    client: redis::Client,
    queue_key: String,
}

impl JobQueue {
    pub fn new(client: redis::Client, config: &RedisConfig) -> Self {
        Self {
            client,
            queue_key: config.queue_key.clone(),
        }
    }

    /// Enqueue a fresh job, returning its generated id
    pub async fn enqueue(&self, job_type: &str, data: Value) -> WorkerResult<String> {
        let envelope = JobEnvelope {
            job_type: job_type.to_string(),
            data,
            job_id: Uuid::new_v4().to_string(),
            attempts: 0,
        };
        let job_id = envelope.job_id.clone();

        self.push(&envelope).await?;
        tracing::debug!(job_type = job_type, job_id = %job_id, "Enqueued job");
        Ok(job_id)
    }

    /// Re-enqueue an existing envelope (retry path; keeps its job id)
    pub async fn requeue(&self, envelope: &JobEnvelope) -> WorkerResult<()> {
        self.push(envelope).await
    }

    async fn push(&self, envelope: &JobEnvelope) -> WorkerResult<()> {
        let json = serde_json::to_string(envelope)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.lpush(&self.queue_key, json).await?;
        Ok(())
    }

    /// Block up to `timeout_secs` waiting for the next job
    pub async fn pop(&self, timeout_secs: u64) -> WorkerResult<Option<JobEnvelope>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let popped: Option<(String, String)> =
            conn.brpop(&self.queue_key, timeout_secs as f64).await?;

        match popped {
            Some((_key, json)) => {
                let envelope: JobEnvelope = serde_json::from_str(&json)?;
                Ok(Some(envelope))
            }
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl SyncScheduler for JobQueue {
    async fn schedule_resync(&self, reason: &str) -> WorkerResult<String> {
        self.enqueue(
            jobs::sync_aggregates::JOB_TYPE,
            serde_json::json!({ "reason": reason }),
        )
        .await
    }
}

/// Consumes the queue and drives jobs to a terminal state
pub struct QueueRunner {
    queue: JobQueue,
    registry: Arc<HandlerRegistry>,
    progress: RedisProgress,
    semaphore: Arc<Semaphore>,
    poll_interval_secs: u64,
    max_retries: u32,
    retry_delay_secs: u64,
}

impl QueueRunner {
    pub fn new(
        queue: JobQueue,
        registry: Arc<HandlerRegistry>,
        progress: RedisProgress,
        config: &Config,
    ) -> Self {
        Self {
            queue,
            registry,
            progress,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            poll_interval_secs: config.poll_interval_secs,
            max_retries: config.max_retries,
            retry_delay_secs: config.retry_delay_secs,
        }
    }

    /// Run the consume loop until the process is stopped
    pub async fn run(&self) -> WorkerResult<()> {
        tracing::info!(
            job_types = ?self.registry.job_types(),
            "Worker queue runner started"
        );

        loop {
            let envelope = match self.queue.pop(self.poll_interval_secs).await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to poll job queue");
                    tokio::time::sleep(Duration::from_secs(self.poll_interval_secs)).await;
                    continue;
                }
            };

            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    // Semaphore closed: runner is shutting down
                    return Ok(());
                }
            };

            let queue = self.queue.clone();
            let registry = self.registry.clone();
            let progress = self.progress.clone();
            let max_retries = self.max_retries;
            let retry_delay_secs = self.retry_delay_secs;

            tokio::spawn(async move {
                let outcome =
                    run_one(&registry, &progress, envelope.clone()).await;
                drop(permit);
                finish(queue, envelope, outcome, max_retries, retry_delay_secs).await;
            });
        }
    }
}

/// Dispatch one envelope through the registry
async fn run_one(
    registry: &HandlerRegistry,
    progress: &RedisProgress,
    envelope: JobEnvelope,
) -> (DispatchOutcome, u64) {
    let started = Instant::now();
    let ctx = JobContext::new(
        envelope.job_id.clone(),
        Arc::new(progress.for_job(envelope.job_id.clone())),
    );

    tracing::info!(
        job_type = %envelope.job_type,
        job_id = %envelope.job_id,
        attempt = envelope.attempts + 1,
        "Processing job"
    );

    let outcome = registry
        .dispatch(&envelope.job_type, envelope.data, &ctx)
        .await;
    (outcome, started.elapsed().as_millis() as u64)
}

/// Apply terminal logging and retry policy to a dispatch outcome
async fn finish(
    queue: JobQueue,
    envelope: JobEnvelope,
    (outcome, duration_ms): (DispatchOutcome, u64),
    max_retries: u32,
    retry_delay_secs: u64,
) {
    match outcome {
        DispatchOutcome::Completed(_) => {
            let result = JobResult::success(duration_ms);
            tracing::info!(
                job_type = %envelope.job_type,
                job_id = %envelope.job_id,
                duration_ms = result.duration_ms,
                "Job completed"
            );
        }
        DispatchOutcome::Rejected { reason } => {
            tracing::warn!(
                job_type = %envelope.job_type,
                job_id = %envelope.job_id,
                reason = %reason,
                "Job rejected"
            );
        }
        DispatchOutcome::Failed(error) => {
            let attempts = envelope.attempts + 1;

            if error.is_retryable() && attempts <= max_retries {
                let delay = retry_delay_secs * 2u64.saturating_pow(attempts - 1);
                tracing::warn!(
                    job_type = %envelope.job_type,
                    job_id = %envelope.job_id,
                    attempt = attempts,
                    retry_in_secs = delay,
                    error = %error,
                    "Job failed, scheduling retry"
                );

                tokio::time::sleep(Duration::from_secs(delay)).await;
                let retry = JobEnvelope {
                    attempts,
                    ..envelope
                };
                if let Err(e) = queue.requeue(&retry).await {
                    tracing::error!(job_id = %retry.job_id, error = %e, "Failed to re-enqueue job");
                }
            } else {
                let terminal = if error.is_retryable() && attempts > max_retries {
                    WorkerError::MaxRetriesExceeded {
                        attempts,
                        reason: error.to_string(),
                    }
                } else {
                    error
                };
                terminal.log();

                let result = JobResult::from_error(&terminal, attempts, duration_ms);
                tracing::error!(
                    job_type = %envelope.job_type,
                    job_id = %envelope.job_id,
                    attempts = result.attempts,
                    duration_ms = result.duration_ms,
                    error = result.error_message.as_deref().unwrap_or("unknown"),
                    "Job failed terminally"
                );
            }
        }
    }
}
