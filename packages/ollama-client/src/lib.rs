//! Ollama API client for Folio AI generation
//!
//! This crate provides the client used by generation jobs to produce
//! content insights (summaries, tags, tone) from an Ollama LLM.
//!
//! # Requirements
//!
//! - Ollama must be running and accessible at the configured URL
//! - The generation model must be pulled before use:
//!   ```bash
//!   ollama pull mistral
//!   ```
//!
//! # Thread Safety
//!
//! `OllamaClient` is `Clone + Send + Sync` and can be safely shared
//! across threads. It uses a shared HTTP client connection pool.
//!
//! # Example
//!
//! ```no_run
//! use folio_ollama_client::{ChatMessage, OllamaClient};
//! use folio_shared_config::OllamaConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OllamaConfig::default();
//! let client = OllamaClient::new(&config)?;
//!
//! // Generate text
//! let response = client.generate("Summarize this post in one sentence: ...").await?;
//! println!("Response: {}", response);
//!
//! // Chat with a system prompt
//! let messages = vec![
//!     ChatMessage::system("You are an editorial assistant."),
//!     ChatMessage::user("Suggest tags for this article."),
//! ];
//! let response = client.chat(messages).await?;
//! println!("Chat response: {}", response);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

pub use client::OllamaClient;
pub use error::{OllamaError, OllamaResult};
pub use models::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, ContentInsights, GenerateOptions,
    GenerateRequest, GenerateResponse, ListModelsResponse, Tone,
};
