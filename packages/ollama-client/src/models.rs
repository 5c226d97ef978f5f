//! Request and response types for the Ollama API

use serde::{Deserialize, Serialize};

/// Request for text generation
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    /// Model to use
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
    /// Generation options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

/// Options for text generation
#[derive(Debug, Clone, Serialize, Default)]
pub struct GenerateOptions {
    /// Temperature (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    /// Top-p sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Top-k sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

/// Response from text generation (non-streaming)
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    /// Generated text
    pub response: String,
    /// Whether generation is complete
    #[serde(default)]
    pub done: bool,
    /// Total duration in nanoseconds
    #[serde(default)]
    pub total_duration: Option<u64>,
    /// Tokens generated
    #[serde(default)]
    pub eval_count: Option<u32>,
}

/// Chat message role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: ChatRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Request for chat completion
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,
    /// Chat messages
    pub messages: Vec<ChatMessage>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
    /// Generation options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

/// Response from chat completion (non-streaming)
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// The assistant's message
    pub message: ChatMessage,
    /// Whether the chat turn is complete
    #[serde(default)]
    pub done: bool,
}

/// Response from listing models
#[derive(Debug, Clone, Deserialize)]
pub struct ListModelsResponse {
    /// Available models
    pub models: Vec<ModelInfo>,
}

/// A single model entry
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    /// Model name (e.g., "mistral:latest")
    pub name: String,
}

/// Structured insights extracted from a content entity by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentInsights {
    /// One- to two-sentence summary of the content
    pub summary: String,
    /// Suggested topic tags
    pub tags: Vec<String>,
    /// Overall tone of the writing
    pub tone: Tone,
}

/// Tone classification for generated insights
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Informal,
    Neutral,
    Formal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_constructors() {
        let msg = ChatMessage::system("be helpful");
        assert_eq!(msg.role, ChatRole::System);

        let msg = ChatMessage::user("hello");
        assert_eq!(msg.role, ChatRole::User);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn test_content_insights_deserialization() {
        let json = r#"{"summary": "A post about Rust.", "tags": ["rust", "async"], "tone": "neutral"}"#;
        let insights: ContentInsights = serde_json::from_str(json).unwrap();

        assert_eq!(insights.summary, "A post about Rust.");
        assert_eq!(insights.tags, vec!["rust", "async"]);
        assert_eq!(insights.tone, Tone::Neutral);
    }

    #[test]
    fn test_tone_rejects_unknown_variant() {
        let json = r#"{"summary": "s", "tags": [], "tone": "sarcastic"}"#;
        assert!(serde_json::from_str::<ContentInsights>(json).is_err());
    }

    #[test]
    fn test_generate_options_skip_none() {
        let options = GenerateOptions {
            temperature: Some(0.3),
            ..Default::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        assert!(json.contains("temperature"));
        assert!(!json.contains("num_predict"));
    }
}
