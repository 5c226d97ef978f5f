//! Entity model and storage contract for Folio content
//!
//! Every piece of content in Folio is an [`Entity`]: a markdown body with
//! typed metadata, addressed by `(entity_type, id)`. This crate provides the
//! entity model, the [`EntityStore`] trait that all storage backends
//! implement, and the Postgres reference implementation used in production.
//!
//! # Thread Safety
//!
//! `PgEntityStore` is `Clone + Send + Sync` and wraps a shared connection
//! pool; it can be handed to concurrently running jobs as
//! `Arc<dyn EntityStore>`.

mod entity;
mod postgres;
mod slug;
mod store;

pub use entity::Entity;
pub use postgres::PgEntityStore;
pub use slug::{aggregate_id, slugify};
pub use store::{EntityStore, ListQuery, MetadataFilter, SortOrder, StoreError, StoreResult};
