//! Shared test utilities for the Folio workspace
//!
//! This crate provides test doubles for Folio's external collaborators so
//! job logic can be exercised without a database, Redis, or a running
//! Ollama instance.
//!
//! # Provided doubles
//!
//! - [`MemoryEntityStore`] - in-memory `EntityStore` with fault injection
//! - [`MockOllamaServer`] - wiremock-backed Ollama HTTP server
//! - [`fixtures`] - entity builders for common test shapes
//!
//! # Example
//!
//! ```rust,ignore
//! use folio_test_utils::{fixtures, MemoryEntityStore};
//!
//! #[tokio::test]
//! async fn test_with_store() {
//!     let store = MemoryEntityStore::new();
//!     store.seed(fixtures::post_with_series("p1", "AI")).await;
//! }
//! ```

pub mod fixtures;
mod ollama;
mod store;

pub use ollama::MockOllamaServer;
pub use store::MemoryEntityStore;
