//! LLM client trait abstraction.
//!
//! [`LLMClient`] abstracts over the supported backends so that the router,
//! the retry loop and the AI-assisted validators can call any of them the
//! same way.

use crate::llm::error::LLMError;
use crate::messages::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Free-form text
    #[default]
    Text,
    /// A single JSON object
    JsonObject,
}

/// A provider-independent completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model name as understood by the provider (router prefixes removed)
    pub model: String,
    /// The conversation so far
    pub messages: Vec<Message>,
    /// Maximum tokens to generate; the provider default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Requested output format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    /// MCP server configuration made available to the model, if the backend supports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_config: Option<serde_json::Value>,
}

impl CompletionRequest {
    /// Creates a request for the given model and conversation.
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            response_format: None,
            mcp_config: None,
        }
    }

    /// Sets the maximum tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the response format.
    #[must_use]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Returns true if JSON output was requested.
    #[must_use]
    pub fn wants_json(&self) -> bool {
        self.response_format == Some(ResponseFormat::JsonObject)
    }

    /// Returns the content of the first user message, if any.
    #[must_use]
    pub fn first_user_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == crate::messages::MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: u32,
    /// Generated tokens
    pub output_tokens: u32,
}

/// A normalised response from any provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Response ID, when the provider supplies one
    pub id: Option<String>,
    /// The model that answered
    pub model: String,
    /// The provider that answered
    pub provider: String,
    /// The generated text
    pub content: String,
    /// The provider's stop/finish reason, verbatim
    pub finish_reason: Option<String>,
    /// Token usage, when reported
    pub usage: Option<Usage>,
    /// The raw response body
    pub raw: serde_json::Value,
}

impl CompletionResponse {
    /// Creates a response carrying only text; used by tests and simple backends.
    #[must_use]
    pub fn text(provider: impl Into<String>, model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            model: model.into(),
            provider: provider.into(),
            content: content.into(),
            finish_reason: None,
            usage: None,
            raw: serde_json::Value::Null,
        }
    }
}

/// Trait for LLM API clients.
///
/// # Example
///
/// ```ignore
/// use llm_call::llm::{CompletionRequest, LLMClient, OpenAIClient, ProviderConfig};
/// use llm_call::messages::Message;
///
/// let client = OpenAIClient::new(&ProviderConfig::openai("sk-..."))?;
/// let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("Hello!")]);
/// let response = client.complete(&request).await?;
/// ```
#[async_trait]
pub trait LLMClient: Send + Sync + std::fmt::Debug {
    /// Sends a non-streaming completion request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the provider reports an error,
    /// or no text can be extracted from the answer.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError>;

    /// Returns the name of this provider for logging.
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_options() {
        let request = CompletionRequest::new("gpt-4o", vec![Message::user("hi")])
            .with_max_tokens(256)
            .with_temperature(0.2)
            .with_response_format(ResponseFormat::JsonObject);

        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.temperature, Some(0.2));
        assert!(request.wants_json());
        assert!(request.mcp_config.is_none());
    }

    #[test]
    fn first_user_prompt_skips_system() {
        let request = CompletionRequest::new(
            "m",
            vec![Message::system("rules"), Message::user("question"), Message::user("more")],
        );
        assert_eq!(request.first_user_prompt(), Some("question"));
    }

    #[test]
    fn request_omits_unset_options_when_serialized() {
        let request = CompletionRequest::new("m", vec![]);
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("mcp_config").is_none());
    }

    #[test]
    fn text_response_has_no_raw_body() {
        let response = CompletionResponse::text("openai", "gpt-4o", "Hello");
        assert_eq!(response.content, "Hello");
        assert_eq!(response.raw, serde_json::Value::Null);
        assert!(response.usage.is_none());
    }
}
