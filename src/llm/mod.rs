//! LLM invocation layer.
//!
//! The [`LlmDriver`] trait defines the streaming interface to the hosted
//! model provider: one request in, one lazily produced sequence of
//! [`AgentEvent`]s out. [`ChatCompletionsDriver`] implements it against the
//! OpenAI-compatible Chat Completions API (`/v1/chat/completions`).
//!
//! Connection and model parameters travel in an explicit [`LlmSettings`]
//! struct passed to the driver constructor — there is no ambient or global
//! client configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use axum_agent_chat::llm::{ChatCompletionsDriver, LlmSettings};
//!
//! let settings = LlmSettings {
//!     base_url: "https://api.openai.com".to_string(),
//!     api_key: Some("sk-...".to_string()),
//!     model: "gpt-4-turbo".to_string(),
//!     temperature: 0.0,
//! };
//! let driver = ChatCompletionsDriver::new(settings);
//! ```

pub mod chat_completions;
pub mod structured;

pub use chat_completions::ChatCompletionsDriver;
pub use structured::structured_stream;

use crate::events::AgentEvent;
use futures::Stream;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-4-turbo`).
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A message in a conversation, in the shape the invocation layer consumes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content of the message.
    pub content: String,
}

/// Role of a message author. The set is closed; inbound turns with any
/// other role are rejected during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System prompt.
    System,
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// Request to an LLM driver.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Conversation messages as provider-shaped JSON objects.
    pub messages: Vec<serde_json::Value>,
    /// Available tools in OpenAI function schema format.
    pub tools: Vec<serde_json::Value>,
    /// Optional forced tool choice.
    pub tool_choice: Option<serde_json::Value>,
}

/// Build an OpenAI-format function tool definition.
pub fn function_tool(
    name: &str,
    description: &str,
    parameters: serde_json::Value,
) -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description,
            "parameters": parameters,
        }
    })
}

/// Trait for LLM streaming drivers.
///
/// Terminal failures are surfaced as a single `Err` item raised from the
/// sequence, never as a malformed event.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Stream a response from the LLM.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails before any event is produced.
    async fn stream(
        &self,
        req: LlmRequest,
    ) -> anyhow::Result<std::pin::Pin<Box<dyn Stream<Item = anyhow::Result<AgentEvent>> + Send>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_serializes_lowercase() {
        let msg = Message {
            role: MessageRole::Assistant,
            content: "hi".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_function_tool_shape() {
        let tool = function_tool(
            "profanity",
            "Whether the message contains profanity",
            serde_json::json!({"type": "object"}),
        );
        assert_eq!(tool["type"], "function");
        assert_eq!(tool["function"]["name"], "profanity");
        assert_eq!(tool["function"]["parameters"]["type"], "object");
    }
}
