//! Background job definitions and handlers
//!
//! Each job module exposes its queue name (`JOB_TYPE`), a typed payload
//! struct, and a handler implementing [`crate::JobHandler`]:
//! - Content derivation between entity types
//! - Aggregate collection synchronization (full rebuild)
//! - AI insight generation via Ollama

pub mod derive_entity;
pub mod generate_insights;
pub mod sync_aggregates;

pub use derive_entity::DeriveEntityHandler;
pub use generate_insights::GenerateInsightsHandler;
pub use sync_aggregates::SyncAggregatesHandler;
