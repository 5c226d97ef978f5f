//! Configuration error types

use thiserror::Error;

/// Errors raised while loading configuration from the environment
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required environment variable
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable set to a value that does not parse
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_reports_variable_name() {
        temp_env::with_var("FOLIO_TEST_KNOB", Some("nope"), || {
            let err = crate::parse_env::<u64>("FOLIO_TEST_KNOB", 1).unwrap_err();
            match err {
                ConfigError::InvalidValue(name, _) => assert_eq!(name, "FOLIO_TEST_KNOB"),
                other => panic!("unexpected error: {other}"),
            }
        });
    }
}
