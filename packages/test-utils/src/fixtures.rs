//! Entity fixtures for tests

use folio_entity_store::Entity;
use serde_json::{Map, Value};

/// Build an entity with the given id, type, and content and no metadata
pub fn entity(id: &str, entity_type: &str, content: &str) -> Entity {
    Entity::new(id, entity_type, content, Map::new())
}

/// Build a post entity with placeholder markdown content
pub fn post(id: &str) -> Entity {
    entity(id, "post", &format!("# Post {id}\n\nBody of {id}."))
}

/// Build a post entity tagged with a series metadata field
pub fn post_with_series(id: &str, series: &str) -> Entity {
    let mut metadata = Map::new();
    metadata.insert("series".to_string(), Value::String(series.to_string()));
    Entity::new(
        id,
        "post",
        format!("# Post {id}\n\nBody of {id}."),
        metadata,
    )
}

/// Build an entity with arbitrary metadata
pub fn entity_with_metadata(
    id: &str,
    entity_type: &str,
    content: &str,
    metadata: Map<String, Value>,
) -> Entity {
    Entity::new(id, entity_type, content, metadata)
}
