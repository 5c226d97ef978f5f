//! Redis configuration types

use crate::{get_env_or_default, parse_env, ConfigResult};

/// Redis configuration
///
/// Redis backs two concerns in Folio: the job queue list and the per-job
/// append-only progress lists.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Optional password for Redis authentication
    pub password: Option<String>,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Key of the job queue list
    pub queue_key: String,

    /// TTL for per-job progress lists, in seconds
    pub progress_ttl_secs: u64,
}

impl RedisConfig {
    /// Load Redis configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            url: get_env_or_default("REDIS_URL", "redis://localhost:6379"),
            password: std::env::var("REDIS_PASSWORD").ok().filter(|s| !s.is_empty()),
            connect_timeout_secs: parse_env("REDIS_CONNECT_TIMEOUT", 5)?,
            queue_key: get_env_or_default("JOB_QUEUE_KEY", "folio:jobs"),
            progress_ttl_secs: parse_env("JOB_PROGRESS_TTL", 3600)?,
        })
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            password: None,
            connect_timeout_secs: 5,
            queue_key: "folio:jobs".to_string(),
            progress_ttl_secs: 3600,
        }
    }

    /// Build the full connection URL including password if set
    pub fn connection_url(&self) -> String {
        if let Some(ref password) = self.password {
            // Insert the password between scheme and host
            if let Some(scheme_end) = self.url.find("://") {
                let scheme = &self.url[..scheme_end];
                let rest = &self.url[scheme_end + 3..];
                return format!("{}://:{}@{}", scheme, password, rest);
            }
        }
        self.url.clone()
    }

    /// Key of the progress list for one job
    pub fn progress_key(&self, job_id: &str) -> String {
        format!("folio:progress:{}", job_id)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            password: None,
            connect_timeout_secs: 5,
            queue_key: "folio:jobs".to_string(),
            progress_ttl_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://localhost:6379");
        assert!(config.password.is_none());
        assert_eq!(config.queue_key, "folio:jobs");
    }

    #[test]
    fn test_with_url() {
        let config = RedisConfig::with_url("redis://custom:6380");
        assert_eq!(config.url, "redis://custom:6380");
    }

    #[test]
    fn test_connection_url_no_password() {
        let config = RedisConfig::default();
        assert_eq!(config.connection_url(), "redis://localhost:6379");
    }

    #[test]
    fn test_connection_url_with_password() {
        let mut config = RedisConfig::default();
        config.password = Some("secret".to_string());
        assert_eq!(config.connection_url(), "redis://:secret@localhost:6379");
    }

    #[test]
    fn test_progress_key() {
        let config = RedisConfig::default();
        assert_eq!(config.progress_key("abc"), "folio:progress:abc");
    }
}
