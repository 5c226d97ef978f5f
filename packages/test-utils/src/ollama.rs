//! Mock Ollama server for testing insight generation
//!
//! Provides a [`MockOllamaServer`] that simulates Ollama API endpoints
//! for testing AI-related functionality without a real Ollama instance.

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock Ollama server for testing generation and chat
///
/// This struct wraps a [`wiremock::MockServer`] and provides convenience methods
/// for setting up common Ollama API responses.
///
/// # Example
///
/// ```rust,ignore
/// use folio_test_utils::MockOllamaServer;
///
/// #[tokio::test]
/// async fn test_insights() {
///     let server = MockOllamaServer::start().await;
///     server.mock_insights(&["rust", "async"], "A short summary", "neutral").await;
///
///     // Configure your Ollama client with server.url()
///     let url = server.url();
///     // ... run your test
/// }
/// ```
pub struct MockOllamaServer {
    server: MockServer,
}

impl MockOllamaServer {
    /// Start a new mock Ollama server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Mount a mock for successful text generation
    pub async fn mock_generate_success(&self, response_text: &str) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "mistral",
                "response": response_text,
                "done": true
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a mock for text generation failure
    pub async fn mock_generate_failure(&self, status_code: u16, error_message: &str) {
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(status_code).set_body_json(json!({
                    "error": error_message
                })),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a mock for successful chat completion
    pub async fn mock_chat_success(&self, response_text: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "mistral",
                "message": {
                    "role": "assistant",
                    "content": response_text
                },
                "done": true
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a mock for chat completion with custom response JSON
    ///
    /// The JSON value is serialized into the assistant message content,
    /// matching the "respond with JSON only" prompt style.
    pub async fn mock_chat_with_json(&self, response_json: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "mistral",
                "message": {
                    "role": "assistant",
                    "content": serde_json::to_string(&response_json).unwrap()
                },
                "done": true
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a mock for a content insights response
    pub async fn mock_insights(&self, tags: &[&str], summary: &str, tone: &str) {
        self.mock_chat_with_json(json!({
            "summary": summary,
            "tags": tags,
            "tone": tone
        }))
        .await;
    }

    /// Mount a mock for chat completion failure
    pub async fn mock_chat_failure(&self, status_code: u16, error_message: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(status_code).set_body_json(json!({
                    "error": error_message
                })),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a mock for model not found error
    pub async fn mock_model_not_found(&self) {
        Mock::given(method("POST"))
            .and(path_regex("/api/(generate|chat)"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "model 'mistral' not found, try pulling it first"
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a mock for the /api/tags endpoint (list models)
    pub async fn mock_list_models(&self, models: &[&str]) {
        let model_list: Vec<serde_json::Value> = models
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "modified_at": "2024-01-01T00:00:00Z",
                    "size": 4_000_000_000_i64
                })
            })
            .collect();

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": model_list
            })))
            .mount(&self.server)
            .await;
    }

    /// Get reference to the underlying mock server for custom mock setups
    pub fn inner(&self) -> &MockServer {
        &self.server
    }
}
