//! Content collection configuration types

use crate::{get_env_or_default, ConfigResult};

/// Configuration for the primary content collection and its derived
/// aggregate collection.
///
/// Aggregates (e.g., "series") are rebuilt from the grouping field found on
/// primary entities (e.g., the "series" frontmatter field on posts) and are
/// addressed by `{aggregate_prefix}-{slug(key)}` ids.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    /// Primary entity type driving aggregation
    pub primary_type: String,

    /// Derived aggregate entity type
    pub aggregate_type: String,

    /// Metadata field on primary entities holding the grouping key
    pub group_field: String,

    /// Prefix for deterministic aggregate ids
    pub aggregate_prefix: String,
}

impl ContentConfig {
    /// Load content configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            primary_type: get_env_or_default("CONTENT_PRIMARY_TYPE", "post"),
            aggregate_type: get_env_or_default("CONTENT_AGGREGATE_TYPE", "series"),
            group_field: get_env_or_default("CONTENT_GROUP_FIELD", "series"),
            aggregate_prefix: get_env_or_default("CONTENT_AGGREGATE_PREFIX", "series"),
        })
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            primary_type: "post".to_string(),
            aggregate_type: "series".to_string(),
            group_field: "series".to_string(),
            aggregate_prefix: "series".to_string(),
        }
    }
}
