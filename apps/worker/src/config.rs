//! Worker configuration loaded from environment variables
//!
//! This module provides configuration management for the Folio worker service.
//! Configuration is loaded from environment variables with sensible defaults for
//! development environments.

use std::env;

use anyhow::{Context, Result};
use folio_shared_config::{
    CommonConfig, ContentConfig, DatabaseConfig, Environment, OllamaConfig, RedisConfig,
};

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// Job polling interval in seconds
    pub poll_interval_secs: u64,

    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,

    /// Maximum retry attempts for failed jobs
    pub max_retries: u32,

    /// Retry delay base in seconds (exponential backoff)
    pub retry_delay_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        Ok(Self {
            common,

            poll_interval_secs: env::var("WORKER_POLL_INTERVAL")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid WORKER_POLL_INTERVAL value")?,

            max_concurrent_jobs: env::var("WORKER_MAX_CONCURRENT_JOBS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("Invalid WORKER_MAX_CONCURRENT_JOBS value")?,

            max_retries: env::var("WORKER_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Invalid WORKER_MAX_RETRIES value")?,

            retry_delay_secs: env::var("WORKER_RETRY_DELAY")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid WORKER_RETRY_DELAY value")?,
        })
    }

    // Convenience accessors for common config fields

    /// Get database configuration
    pub fn database(&self) -> &DatabaseConfig {
        &self.common.database
    }

    /// Get Redis configuration
    pub fn redis(&self) -> &RedisConfig {
        &self.common.redis
    }

    /// Get Ollama configuration
    pub fn ollama(&self) -> &OllamaConfig {
        &self.common.ollama
    }

    /// Get content collection configuration
    pub fn content(&self) -> &ContentConfig {
        &self.common.content
    }

    /// Get environment mode
    pub fn environment(&self) -> Environment {
        self.common.environment
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.common.environment.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_knobs() {
        temp_env::with_vars_unset(
            [
                "WORKER_POLL_INTERVAL",
                "WORKER_MAX_CONCURRENT_JOBS",
                "WORKER_MAX_RETRIES",
                "WORKER_RETRY_DELAY",
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.poll_interval_secs, 5);
                assert_eq!(config.max_concurrent_jobs, 4);
                assert_eq!(config.max_retries, 3);
                assert_eq!(config.retry_delay_secs, 60);
            },
        );
    }

    #[test]
    fn test_env_overrides() {
        temp_env::with_vars(
            [
                ("WORKER_POLL_INTERVAL", Some("10")),
                ("WORKER_MAX_CONCURRENT_JOBS", Some("8")),
                ("WORKER_MAX_RETRIES", Some("1")),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.poll_interval_secs, 10);
                assert_eq!(config.max_concurrent_jobs, 8);
                assert_eq!(config.max_retries, 1);
            },
        );
    }

    #[test]
    fn test_invalid_poll_interval_fails() {
        temp_env::with_var("WORKER_POLL_INTERVAL", Some("not-a-number"), || {
            let err = Config::from_env().unwrap_err();
            assert!(err.to_string().contains("WORKER_POLL_INTERVAL"));
        });
    }
}
