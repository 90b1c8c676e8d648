//! OpenAI-compatible API client.
//!
//! HTTP client for the chat completions API of OpenAI and compatible servers
//! such as Ollama.

use crate::llm::client::{CompletionRequest, CompletionResponse, LLMClient, ResponseFormat, Usage};
use crate::llm::config::{ProviderConfig, ProviderKind};
use crate::llm::error::LLMError;
use crate::llm::response::{error_from_response, error_from_send, extract_content, token_count};
use crate::messages::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Client for OpenAI-compatible chat completions APIs.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    /// HTTP client
    client: Client,
    /// Which provider this client stands for (OpenAI or Ollama)
    kind: ProviderKind,
    /// Base URL for the API
    base_url: String,
    /// API key (optional for local providers like Ollama)
    api_key: Option<String>,
    /// Maximum tokens when the request does not say
    max_tokens: u32,
    /// Request timeout, reported in timeout errors
    timeout: Duration,
}

/// Request body for the chat completions API.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) response_format: Option<Value>,
    pub(crate) stream: bool,
}

/// A message in chat completions format.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub(crate) role: &'static str,
    pub(crate) content: &'a str,
}

impl<'a> ChatCompletionRequest<'a> {
    /// Builds the wire request from a provider-independent one.
    pub(crate) fn from_request(request: &'a CompletionRequest, default_max_tokens: u32) -> Self {
        Self {
            model: &request.model,
            messages: convert_messages(&request.messages),
            max_tokens: Some(request.max_tokens.unwrap_or(default_max_tokens)),
            temperature: request.temperature,
            response_format: match request.response_format {
                Some(ResponseFormat::JsonObject) => {
                    Some(serde_json::json!({"type": "json_object"}))
                }
                _ => None,
            },
            stream: false,
        }
    }
}

/// Converts internal messages to chat completions format.
pub(crate) fn convert_messages(messages: &[Message]) -> Vec<ChatMessage<'_>> {
    messages
        .iter()
        .map(|m| ChatMessage {
            role: m.role.as_str(),
            content: &m.content,
        })
        .collect()
}

/// Normalises a chat completions body into a [`CompletionResponse`].
pub(crate) fn parse_chat_completion(
    provider: &str,
    requested_model: &str,
    body: Value,
) -> Result<CompletionResponse, LLMError> {
    let content = extract_content(&body)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| LLMError::empty_response(provider))?;

    let finish_reason = body
        .pointer("/choices/0/finish_reason")
        .and_then(Value::as_str)
        .map(str::to_string);

    let usage = body.get("usage").map(|u| Usage {
        input_tokens: token_count(u, "prompt_tokens"),
        output_tokens: token_count(u, "completion_tokens"),
    });

    Ok(CompletionResponse {
        id: body.get("id").and_then(Value::as_str).map(str::to_string),
        model: body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(requested_model)
            .to_string(),
        provider: provider.to_string(),
        content,
        finish_reason,
        usage,
        raw: body,
    })
}

impl OpenAIClient {
    /// Creates a new OpenAI-compatible client.
    ///
    /// # Errors
    ///
    /// Returns `LLMError::network` if the HTTP client cannot be created.
    pub fn new(config: &ProviderConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LLMError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            kind: config.kind,
            base_url: config.base_url.clone(),
            api_key: config.api_key().map(str::to_string),
            max_tokens: config.max_tokens,
            timeout: config.timeout,
        })
    }

    /// Returns the chat completions endpoint URL.
    fn chat_completions_endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LLMError> {
        let body = ChatCompletionRequest::from_request(request, self.max_tokens);

        let mut builder = self
            .client
            .post(self.chat_completions_endpoint())
            .header("content-type", "application/json")
            .json(&body);

        if let Some(ref api_key) = self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        tracing::debug!(
            provider = self.provider_name(),
            model = %request.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );

        let response = builder
            .send()
            .await
            .map_err(|e| error_from_send(e, self.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(&request.model, response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LLMError::parse_error(format!("failed to parse response: {}", e)))?;

        parse_chat_completion(self.provider_name(), &request.model, body)
    }

    fn provider_name(&self) -> &'static str {
        self.kind.as_str()
    }
}
