//! Comprehensive error handling for the Folio worker
//!
//! This module provides a unified error type hierarchy using thiserror
//! for background job processing, with specific variants for each job type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use folio_entity_store::StoreError;

/// Main worker error type with comprehensive error variants
#[derive(Error, Debug)]
pub enum WorkerError {
    // ========== Job Processing Errors ==========
    /// Invalid job payload (missing or malformed fields)
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// No handler registered for a job type
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    /// Job timed out during execution
    #[error("job timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Job failed after maximum retry attempts
    #[error("job failed after {attempts} attempts: {reason}")]
    MaxRetriesExceeded { attempts: u32, reason: String },

    // ========== Entity Store Errors ==========
    /// Entity store operation failed
    #[error("entity store error: {0}")]
    Store(#[from] StoreError),

    // ========== Redis/Queue Errors ==========
    /// Redis operation failed
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Queue operation failed
    #[error("queue error: {0}")]
    Queue(String),

    /// Failed to deserialize job from queue
    #[error("job deserialization failed: {0}")]
    JobDeserialization(#[from] serde_json::Error),

    // ========== Insight Generation Errors ==========
    /// Ollama service unavailable
    #[error("Ollama service unavailable: {0}")]
    OllamaUnavailable(String),

    /// Ollama model not found
    #[error("Ollama model not found: {0}")]
    OllamaModelNotFound(String),

    /// Insight generation failed
    #[error("insight generation failed: {0}")]
    InsightsGeneration(String),

    // ========== HTTP/External Service Errors ==========
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// External service timeout
    #[error("external service timeout: {service}")]
    ServiceTimeout { service: String },

    // ========== Configuration Errors ==========
    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Missing required configuration
    #[error("missing required configuration: {0}")]
    MissingConfiguration(&'static str),

    // ========== Internal Errors ==========
    /// Internal worker error (catch-all for unexpected errors)
    #[error("internal worker error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Redis(_)
            | Self::Queue(_)
            | Self::OllamaUnavailable(_)
            | Self::Http(_)
            | Self::ServiceTimeout { .. }
            | Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Get a severity level for logging
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Critical errors that should alert operators
            Self::Configuration(_)
            | Self::MissingConfiguration(_)
            | Self::MaxRetriesExceeded { .. } => ErrorSeverity::Critical,

            // Errors that indicate service issues
            Self::Store(_) | Self::Redis(_) | Self::OllamaUnavailable(_) | Self::Internal(_) => {
                ErrorSeverity::Error
            }

            // Warnings for expected failures
            Self::Timeout { .. } | Self::ServiceTimeout { .. } | Self::Http(_) => {
                ErrorSeverity::Warning
            }

            // Info level for normal processing issues
            _ => ErrorSeverity::Info,
        }
    }

    /// Get the job type this error is related to, if applicable
    pub fn job_context(&self) -> Option<&'static str> {
        match self {
            Self::OllamaUnavailable(_)
            | Self::OllamaModelNotFound(_)
            | Self::InsightsGeneration(_) => Some("generate_insights"),
            _ => None,
        }
    }

    /// Log the error with appropriate severity
    pub fn log(&self) {
        let context = self.job_context().unwrap_or("general");
        match self.severity() {
            ErrorSeverity::Critical => {
                tracing::error!(
                    error = %self,
                    context = context,
                    retryable = self.is_retryable(),
                    "Critical worker error"
                );
            }
            ErrorSeverity::Error => {
                tracing::error!(
                    error = %self,
                    context = context,
                    retryable = self.is_retryable(),
                    "Worker error"
                );
            }
            ErrorSeverity::Warning => {
                tracing::warn!(
                    error = %self,
                    context = context,
                    retryable = self.is_retryable(),
                    "Worker warning"
                );
            }
            ErrorSeverity::Info => {
                tracing::info!(
                    error = %self,
                    context = context,
                    retryable = self.is_retryable(),
                    "Worker info"
                );
            }
        }
    }
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that should trigger alerts
    Critical,
    /// Standard errors
    Error,
    /// Warnings for expected failures
    Warning,
    /// Informational messages
    Info,
}

/// Result type alias for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Job execution result with metadata for retry handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Whether the job succeeded
    pub success: bool,
    /// Error message if failed
    pub error_message: Option<String>,
    /// Whether the job can be retried
    pub retryable: bool,
    /// Number of attempts made
    pub attempts: u32,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl JobResult {
    /// Create a successful job result
    pub fn success(duration_ms: u64) -> Self {
        Self {
            success: true,
            error_message: None,
            retryable: false,
            attempts: 1,
            duration_ms,
        }
    }

    /// Create a failed job result from an error
    pub fn from_error(err: &WorkerError, attempts: u32, duration_ms: u64) -> Self {
        Self {
            success: false,
            error_message: Some(err.to_string()),
            retryable: err.is_retryable(),
            attempts,
            duration_ms,
        }
    }
}

// ========== Conversion Implementations ==========

impl From<anyhow::Error> for WorkerError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to WorkerError first
        match err.downcast::<WorkerError>() {
            Ok(worker_err) => worker_err,
            Err(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<std::env::VarError> for WorkerError {
    fn from(err: std::env::VarError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<folio_ollama_client::OllamaError> for WorkerError {
    fn from(err: folio_ollama_client::OllamaError) -> Self {
        match &err {
            folio_ollama_client::OllamaError::ConnectionRefused(url) => {
                Self::OllamaUnavailable(format!("connection refused to {}", url))
            }
            folio_ollama_client::OllamaError::ModelNotFound(model) => {
                Self::OllamaModelNotFound(model.clone())
            }
            folio_ollama_client::OllamaError::Timeout(secs) => Self::ServiceTimeout {
                service: format!("Ollama ({}s)", secs),
            },
            folio_ollama_client::OllamaError::RetriesExhausted { .. } => {
                Self::OllamaUnavailable(err.to_string())
            }
            _ => Self::InsightsGeneration(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(WorkerError::Queue("backpressure".to_string()).is_retryable());
        assert!(WorkerError::Timeout { seconds: 30 }.is_retryable());
        assert!(WorkerError::OllamaUnavailable("down".to_string()).is_retryable());
        assert!(WorkerError::Store(StoreError::Backend("io".to_string())).is_retryable());

        assert!(!WorkerError::InvalidPayload("bad".to_string()).is_retryable());
        assert!(!WorkerError::NotFound("post/p1".to_string()).is_retryable());
        assert!(!WorkerError::UnknownJobType("nope".to_string()).is_retryable());
        assert!(!WorkerError::Store(StoreError::NotFound {
            entity_type: "post".to_string(),
            id: "p1".to_string(),
        })
        .is_retryable());
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(
            WorkerError::MissingConfiguration("DATABASE_URL").severity(),
            ErrorSeverity::Critical
        );
        assert_eq!(
            WorkerError::Internal("boom".to_string()).severity(),
            ErrorSeverity::Error
        );
        assert_eq!(
            WorkerError::Timeout { seconds: 10 }.severity(),
            ErrorSeverity::Warning
        );
        assert_eq!(
            WorkerError::InvalidPayload("bad".to_string()).severity(),
            ErrorSeverity::Info
        );
    }

    #[test]
    fn test_job_context_mapping() {
        assert_eq!(
            WorkerError::InsightsGeneration("no json".to_string()).job_context(),
            Some("generate_insights")
        );
        assert_eq!(WorkerError::Queue("full".to_string()).job_context(), None);
    }

    #[test]
    fn test_job_result_from_error() {
        let err = WorkerError::OllamaUnavailable("connection refused".to_string());
        let result = JobResult::from_error(&err, 2, 1500);

        assert!(!result.success);
        assert!(result.retryable);
        assert_eq!(result.attempts, 2);
        assert!(result.error_message.unwrap().contains("connection refused"));
    }
}
