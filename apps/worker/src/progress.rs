//! Job progress reporting
//!
//! Progress is an observational side channel: jobs report updates as they
//! work, consumers poll or stream them, and nothing in job execution blocks
//! on or reads progress back. The production reporter forwards updates over
//! an unbounded channel to a writer task that appends them to a per-job
//! Redis list with a TTL.

use folio_shared_config::RedisConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A single progress observation within one job's lifetime.
///
/// `progress` is non-decreasing within a job; `total` is the expected final
/// value, which may be revised as the job learns more about its workload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressUpdate {
    pub progress: u64,
    pub total: u64,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(progress: u64, total: u64, message: impl Into<String>) -> Self {
        Self {
            progress,
            total,
            message: message.into(),
        }
    }
}

/// Fire-and-forget progress sink handed to every job.
///
/// `report` must never block job execution and must never fail the job;
/// delivery is best-effort.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Reporter that discards all updates, for untracked invocations
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Redis-backed progress writer.
///
/// Holds the sending half of a channel drained by a spawned writer task;
/// [`RedisProgress::for_job`] creates per-job reporters that tag updates
/// with their job id.
#[derive(Clone)]
pub struct RedisProgress {
    tx: mpsc::UnboundedSender<(String, ProgressUpdate)>,
}

impl RedisProgress {
    /// Spawn the writer task and return a handle for creating reporters
    pub fn spawn(client: redis::Client, config: RedisConfig) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, ProgressUpdate)>();

        tokio::spawn(async move {
            let mut conn = match client.get_multiplexed_async_connection().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "Progress writer could not connect to Redis, updates will be dropped");
                    while rx.recv().await.is_some() {}
                    return;
                }
            };

            while let Some((job_id, update)) = rx.recv().await {
                let key = config.progress_key(&job_id);
                let json = match serde_json::to_string(&update) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(job_id = %job_id, error = %e, "Failed to serialize progress update");
                        continue;
                    }
                };

                let result: Result<(), redis::RedisError> = redis::pipe()
                    .rpush(&key, json)
                    .ignore()
                    .expire(&key, config.progress_ttl_secs as i64)
                    .ignore()
                    .query_async(&mut conn)
                    .await;

                if let Err(e) = result {
                    tracing::warn!(job_id = %job_id, error = %e, "Failed to write progress update");
                }
            }
        });

        Self { tx }
    }

    /// Create a reporter that tags updates with the given job id
    pub fn for_job(&self, job_id: impl Into<String>) -> JobProgress {
        JobProgress {
            job_id: job_id.into(),
            tx: self.tx.clone(),
        }
    }
}

/// Per-job reporter produced by [`RedisProgress::for_job`]
pub struct JobProgress {
    job_id: String,
    tx: mpsc::UnboundedSender<(String, ProgressUpdate)>,
}

impl ProgressReporter for JobProgress {
    fn report(&self, update: ProgressUpdate) {
        // A closed channel means the writer is gone; updates are best-effort
        let _ = self.tx.send((self.job_id.clone(), update));
    }
}
