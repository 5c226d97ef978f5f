//! The Folio entity record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A persisted content record: markdown body plus typed metadata.
///
/// `id` is unique within an `entity_type`; two different types may reuse the
/// same id without collision. `content_hash` always matches a SHA-256 digest
/// of `content` at rest; it is set by the constructors and
/// [`set_content`](Entity::set_content) and never assignable on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    /// Identifier, unique within the entity type
    pub id: String,

    /// Entity type (e.g., "post", "series", "block")
    pub entity_type: String,

    /// Markdown body
    pub content: String,

    /// SHA-256 hex digest of `content`
    pub content_hash: String,

    /// Frontmatter-style metadata fields
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last update timestamp
    pub updated: DateTime<Utc>,
}

impl Entity {
    /// Create a new entity, computing the content hash
    pub fn new(
        id: impl Into<String>,
        entity_type: impl Into<String>,
        content: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let content = content.into();
        let now = Utc::now();

        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            content_hash: hash_content(&content),
            content,
            metadata,
            created: now,
            updated: now,
        }
    }

    /// Replace the body, recomputing the content hash
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.content_hash = hash_content(&self.content);
        self.updated = Utc::now();
    }

    /// Get a metadata field as a string, if present and non-null
    pub fn metadata_str(&self, field: &str) -> Option<&str> {
        self.metadata.get(field).and_then(|v| v.as_str())
    }

    /// Copy the portable fields (content + metadata) onto another entity.
    ///
    /// Identity fields (`id`, `entity_type`, `created`) are left untouched;
    /// `content_hash` and `updated` are recomputed. This is the merge used
    /// when deriving one entity into an existing one of another type.
    pub fn apply_portable_fields(&mut self, source: &Entity) {
        self.metadata = source.metadata.clone();
        self.set_content(source.content.clone());
    }

    /// Build a fresh entity of another type from this entity's portable fields
    pub fn derive_as(&self, target_id: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self::new(target_id, target_type, self.content.clone(), self.metadata.clone())
    }
}

/// SHA-256 hex digest of a content body
pub(crate) fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
